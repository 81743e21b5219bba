//! Manages buffer objects, their properties and their in-flight usage.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

/// Represents a unique identifier for a Wayland client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Creates a new client ID.
    ///
    /// # Arguments
    /// * `id`: The raw `u64` value for this client ID.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value of this client ID.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Represents a unique identifier for a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

impl BufferId {
    /// Creates a new, unique `BufferId`.
    fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        BufferId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Specifies the underlying type or source of a buffer's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    /// Buffer memory is managed via a shared memory mechanism (e.g., `wl_shm`).
    Shm,
    /// Buffer memory is represented by a DMA buffer file descriptor.
    DmaBuf,
}

/// Enumerates the pixel formats a buffer can carry.
///
/// These align with Wayland's `wl_shm.format` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    /// 32-bit ARGB format, 8 bits per channel, premultiplied alpha first.
    Argb8888,
    /// 32-bit XRGB format, 8 bits per channel, alpha ignored (X).
    Xrgb8888,
    /// YUV format, NV12 (2-plane Y followed by interleaved UV).
    Nv12,
}

impl BufferFormat {
    /// Whether pixels of this format carry a meaningful alpha channel.
    pub fn has_alpha(&self) -> bool {
        matches!(self, BufferFormat::Argb8888)
    }
}

/// Errors produced by [`BufferManager`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer is not (or no longer) registered.
    #[error("buffer {0:?} is not registered")]
    NotFound(BufferId),
    /// Width or height was zero.
    #[error("invalid buffer dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    /// The pixel contents do not match `width * height`.
    #[error("buffer contents hold {actual} pixels, expected {expected}")]
    ContentsSizeMismatch { expected: usize, actual: usize },
    /// `clear_busy` was called on a buffer no render is using.
    #[error("buffer {0:?} is not busy")]
    NotBusy(BufferId),
}

/// What happened to a buffer after the compositor or the client let go of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRelease {
    /// The compositor holds no reference anymore; the client may reuse the buffer
    /// (`wl_buffer.release` should be sent).
    Released,
    /// The buffer was removed from the manager entirely.
    Freed,
    /// A render still uses the buffer; the release completes when it goes idle.
    Deferred,
}

/// Holds detailed information about a specific buffer.
///
/// Dimensions and orientation are fixed at registration. `busy_count` tracks how many
/// in-flight renders currently read the buffer; while it is non-zero the buffer may
/// be neither released to its client nor freed.
#[derive(Debug)]
pub struct BufferDetails {
    /// Unique identifier for this buffer.
    pub id: BufferId,
    /// The type of the buffer (e.g., SHM, DMA-BUF).
    pub buffer_type: BufferType,
    /// Width of the buffer in pixels.
    pub width: u32,
    /// Height of the buffer in pixels.
    pub height: u32,
    /// Stride of the buffer in bytes (bytes per row).
    pub stride: u32,
    /// Pixel format of the buffer.
    pub format: BufferFormat,
    /// Rows are stored bottom-up.
    pub y_inverted: bool,
    /// Optional ID of the client that created this buffer.
    pub client_owner_id: Option<ClientId>,
    /// Mapped pixel words for shm buffers, one `u32` per pixel, row-major.
    pub contents: Option<Arc<[u32]>>,
    busy_count: u32,
    release_pending: bool,
    destroy_pending: bool,
}

impl BufferDetails {
    fn new(
        buffer_type: BufferType,
        width: u32,
        height: u32,
        stride: u32,
        format: BufferFormat,
        client_owner_id: Option<ClientId>,
    ) -> Self {
        Self {
            id: BufferId::new_unique(),
            buffer_type,
            width,
            height,
            stride,
            format,
            y_inverted: false,
            client_owner_id,
            contents: None,
            busy_count: 0,
            release_pending: false,
            destroy_pending: false,
        }
    }

    /// Number of in-flight renders using this buffer.
    pub fn busy_count(&self) -> u32 {
        self.busy_count
    }

    /// Returns `true` while at least one render uses the buffer.
    pub fn is_busy(&self) -> bool {
        self.busy_count > 0
    }
}

/// Owns every client buffer known to the compositor.
///
/// Buffers whose release or destruction was requested while busy are parked in a
/// separate deferred set, so whoever dropped them (usually a surface) never has to
/// wait for the render that still reads them.
#[derive(Debug, Default)]
pub struct BufferManager {
    buffers: HashMap<BufferId, BufferDetails>,
    deferred: HashSet<BufferId>,
}

impl BufferManager {
    /// Creates a new, empty `BufferManager`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new buffer with the specified properties.
    ///
    /// This corresponds to a client creating a buffer object (e.g.
    /// `wl_shm_pool.create_buffer` or a DMA-BUF import).
    ///
    /// # Errors
    /// `BufferError::InvalidDimensions` when `width` or `height` is zero.
    pub fn register_buffer(
        &mut self,
        buffer_type: BufferType,
        width: u32,
        height: u32,
        stride: u32,
        format: BufferFormat,
        client_owner_id: Option<ClientId>,
    ) -> Result<BufferId, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimensions { width, height });
        }
        let details = BufferDetails::new(buffer_type, width, height, stride, format, client_owner_id);
        let id = details.id;
        trace!(buffer = ?id, width, height, ?format, "registered buffer");
        self.buffers.insert(id, details);
        Ok(id)
    }

    /// Attaches mapped pixel contents to a registered buffer.
    pub fn set_contents(&mut self, id: BufferId, contents: Arc<[u32]>) -> Result<(), BufferError> {
        let details = self.buffers.get_mut(&id).ok_or(BufferError::NotFound(id))?;
        let expected = details.width as usize * details.height as usize;
        if contents.len() != expected {
            return Err(BufferError::ContentsSizeMismatch { expected, actual: contents.len() });
        }
        details.contents = Some(contents);
        Ok(())
    }

    /// Marks the buffer's rows as stored bottom-up.
    pub fn set_y_inverted(&mut self, id: BufferId, y_inverted: bool) -> Result<(), BufferError> {
        let details = self.buffers.get_mut(&id).ok_or(BufferError::NotFound(id))?;
        details.y_inverted = y_inverted;
        Ok(())
    }

    /// Retrieves the details for a given `BufferId`, or `None` if it is unknown.
    pub fn get_buffer_details(&self, id: BufferId) -> Option<&BufferDetails> {
        self.buffers.get(&id)
    }

    /// Returns `true` if the buffer is registered.
    pub fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// Number of registered buffers, deferred ones included.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if no buffer is registered.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffers whose release or destruction waits for a render to finish.
    pub fn deferred(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.deferred.iter().copied()
    }

    /// Records that a render started reading the buffer.
    ///
    /// # Returns
    /// The new busy count.
    pub fn mark_busy(&mut self, id: BufferId) -> Result<u32, BufferError> {
        let details = self.buffers.get_mut(&id).ok_or(BufferError::NotFound(id))?;
        details.busy_count += 1;
        Ok(details.busy_count)
    }

    /// Records that a render finished reading the buffer.
    ///
    /// When the count drops to zero, a parked release or destruction completes and is
    /// reported back so the caller can notify the client.
    pub fn clear_busy(&mut self, id: BufferId) -> Result<Option<BufferRelease>, BufferError> {
        let details = self.buffers.get_mut(&id).ok_or(BufferError::NotFound(id))?;
        if details.busy_count == 0 {
            return Err(BufferError::NotBusy(id));
        }
        details.busy_count -= 1;
        if details.busy_count > 0 {
            return Ok(None);
        }

        self.deferred.remove(&id);
        if details.destroy_pending {
            self.buffers.remove(&id);
            debug!(buffer = ?id, "deferred buffer freed");
            Ok(Some(BufferRelease::Freed))
        } else if details.release_pending {
            details.release_pending = false;
            debug!(buffer = ?id, "deferred buffer released");
            Ok(Some(BufferRelease::Released))
        } else {
            Ok(None)
        }
    }

    /// Drops the compositor's reference to a buffer (superseded by a new attach, or
    /// its surface went away).
    pub fn release_buffer(&mut self, id: BufferId) -> Result<BufferRelease, BufferError> {
        let details = self.buffers.get_mut(&id).ok_or(BufferError::NotFound(id))?;
        if details.is_busy() {
            details.release_pending = true;
            self.deferred.insert(id);
            trace!(buffer = ?id, busy = details.busy_count, "release deferred");
            return Ok(BufferRelease::Deferred);
        }
        Ok(BufferRelease::Released)
    }

    /// Removes a buffer whose client object was destroyed.
    ///
    /// A busy buffer stays registered until its last render completes.
    pub fn destroy_buffer(&mut self, id: BufferId) -> Result<BufferRelease, BufferError> {
        let details = self.buffers.get_mut(&id).ok_or(BufferError::NotFound(id))?;
        if details.is_busy() {
            details.destroy_pending = true;
            self.deferred.insert(id);
            trace!(buffer = ?id, busy = details.busy_count, "destruction deferred");
            return Ok(BufferRelease::Deferred);
        }
        self.buffers.remove(&id);
        Ok(BufferRelease::Freed)
    }
}
