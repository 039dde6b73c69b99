use crate::resource::{BufferDesc, BufferKind, GpuDevice, GpuError, ResourceId};

/// Fixed-size linear GPU buffer.
///
/// There is no resize; recreate the buffer to change its size.
pub struct GpuBuffer<D: GpuDevice> {
    id: ResourceId,
    raw: D::Buffer,
    size: u64,
    kind: BufferKind,
}

impl<D: GpuDevice> GpuBuffer<D> {
    pub fn new(device: &D, label: &str, size: u64, kind: BufferKind) -> Result<Self, GpuError> {
        if size == 0 {
            return Err(GpuError::ZeroSizedBuffer);
        }
        let raw = device.create_buffer(&BufferDesc { label, size, kind })?;
        let id = ResourceId::next();
        tracing::debug!(label, size, ?kind, %id, "buffer allocated");
        Ok(Self { id, raw, size, kind })
    }

    /// Dynamic-write storage that can be read back.
    pub fn plain(device: &D, label: &str, size: u64) -> Result<Self, GpuError> {
        Self::new(device, label, size, BufferKind::Plain)
    }

    /// Large allocation expected to be populated sparsely.
    pub fn sparse(device: &D, label: &str, size: u64) -> Result<Self, GpuError> {
        Self::new(device, label, size, BufferKind::Sparse)
    }

    /// Constant block for shader stages.
    pub fn uniform(device: &D, label: &str, size: u64) -> Result<Self, GpuError> {
        Self::new(device, label, size, BufferKind::Uniform)
    }

    pub fn write(&self, device: &D, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        self.check_range(offset, data.len() as u64)?;
        device.write_buffer(&self.raw, offset, data)
    }

    /// Synchronously copy `len` bytes starting at `offset` to the host.
    ///
    /// Blocks until the GPU has finished pending work on the buffer.
    pub fn read(&self, device: &D, offset: u64, len: u64) -> Result<Vec<u8>, GpuError> {
        self.check_range(offset, len)?;
        device.read_buffer(&self.raw, offset, len)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn raw(&self) -> &D::Buffer {
        &self.raw
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<(), GpuError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(GpuError::OutOfRange {
                offset,
                len,
                size: self.size,
            }),
        }
    }
}

impl<D: GpuDevice> std::fmt::Debug for GpuBuffer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;

    #[test]
    fn variants_carry_their_kind() {
        let device = HeadlessDevice::new();
        assert_eq!(GpuBuffer::plain(&device, "p", 16).unwrap().kind(), BufferKind::Plain);
        assert_eq!(GpuBuffer::sparse(&device, "s", 1 << 30).unwrap().kind(), BufferKind::Sparse);
        assert_eq!(GpuBuffer::uniform(&device, "u", 64).unwrap().kind(), BufferKind::Uniform);
        assert_eq!(device.buffers_created(), 3);
    }

    #[test]
    fn zero_size_is_rejected() {
        let device = HeadlessDevice::new();
        assert!(matches!(
            GpuBuffer::plain(&device, "p", 0),
            Err(GpuError::ZeroSizedBuffer)
        ));
        assert_eq!(device.buffers_created(), 0);
    }

    #[test]
    fn reads_back_written_bytes() {
        let device = HeadlessDevice::new();
        let buffer = GpuBuffer::plain(&device, "p", 16).unwrap();
        buffer.write(&device, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.read(&device, 2, 8).unwrap(), vec![0, 0, 1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn sparse_reads_zero_where_unwritten() {
        let device = HeadlessDevice::new();
        let buffer = GpuBuffer::sparse(&device, "s", 1 << 32).unwrap();
        buffer.write(&device, 1 << 31, &[9]).unwrap();
        assert_eq!(buffer.read(&device, (1 << 31) - 1, 2).unwrap(), vec![0, 9]);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let device = HeadlessDevice::new();
        let buffer = GpuBuffer::plain(&device, "p", 16).unwrap();
        assert!(matches!(
            buffer.read(&device, 12, 8),
            Err(GpuError::OutOfRange {
                offset: 12,
                len: 8,
                size: 16
            })
        ));
        assert!(buffer.read(&device, u64::MAX, 2).is_err());
        assert!(buffer.write(&device, 15, &[0, 0]).is_err());
        assert_eq!(buffer.read(&device, 16, 0).unwrap(), Vec::<u8>::new());
    }
}
