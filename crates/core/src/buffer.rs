//! Shared-memory buffer allocation.
//!
//! Allocation is a chain of independently fallible steps: create the backing
//! store, size it, map it, paint it, wrap it in a pool and carve one buffer
//! out of the pool. Every acquisition is tracked in the session's
//! [`ResourceArena`]; if a later step fails, everything acquired by this call
//! is rolled back newest-first before the error is returned.

use std::os::fd::AsFd;

use shmprobe_protocol::{ObjectId, ObjectKind, Request, ShmFormat};
use shmprobe_runtime::DisplayBackend;
use tracing::{debug, info, warn};

use crate::error::{AllocationStep, Error, Result};
use crate::memory::BackingStore;
use crate::pattern;
use crate::request::create;
use crate::resources::{Resource, ResourceArena, Slot};

/// Geometry of a single-plane ARGB8888 buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
	width: u32,
	height: u32,
	stride: u32,
	size: usize,
}

impl BufferLayout {
	pub const FORMAT: ShmFormat = ShmFormat::Argb8888;

	/// `stride = width * 4`, `size = stride * height`; both must fit the
	/// wire's signed 32-bit fields.
	pub fn new(width: u32, height: u32) -> Result<Self> {
		let invalid = || Error::InvalidDimensions { width, height };
		if width == 0 || height == 0 {
			return Err(invalid());
		}
		let stride = width.checked_mul(ShmFormat::BYTES_PER_PIXEL).ok_or_else(invalid)?;
		let size = stride.checked_mul(height).ok_or_else(invalid)?;
		i32::try_from(size).map_err(|_| invalid())?;
		Ok(Self {
			width,
			height,
			stride,
			size: size as usize,
		})
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	pub fn stride(&self) -> u32 {
		self.stride
	}

	/// Total byte size of the pixel data.
	pub fn size(&self) -> usize {
		self.size
	}

	// The casts below are in range: `new` bounds `size`, and so every field, by i32::MAX.
	pub(crate) fn wire_width(&self) -> i32 {
		self.width as i32
	}

	pub(crate) fn wire_height(&self) -> i32 {
		self.height as i32
	}

	fn wire_stride(&self) -> i32 {
		self.stride as i32
	}

	fn wire_size(&self) -> i32 {
		self.size as i32
	}
}

/// The single buffer of the session and the handles behind it.
#[derive(Debug)]
pub struct ShmBuffer {
	layout: BufferLayout,
	buffer: ObjectId,
	pool: ObjectId,
	mapping: Slot,
	releases: u32,
}

impl ShmBuffer {
	pub fn layout(&self) -> BufferLayout {
		self.layout
	}

	pub fn id(&self) -> ObjectId {
		self.buffer
	}

	pub fn pool(&self) -> ObjectId {
		self.pool
	}

	/// Slot of the mapped pixel memory in the session arena.
	pub fn mapping(&self) -> Slot {
		self.mapping
	}

	/// How many times the server has returned the buffer.
	pub fn releases(&self) -> u32 {
		self.releases
	}

	pub(crate) fn on_release(&mut self) {
		self.releases += 1;
		debug!(target = "shmprobe.buffer", id = %self.buffer, releases = self.releases, "buffer released by server");
	}
}

/// Allocates, paints and wraps a `width` x `height` buffer.
pub fn allocate<B, S>(backend: &mut B, resources: &mut ResourceArena, store: &mut S, shm: ObjectId, width: u32, height: u32) -> Result<ShmBuffer>
where
	B: DisplayBackend,
	S: BackingStore + ?Sized,
{
	let layout = BufferLayout::new(width, height)?;
	let mark = resources.mark();

	match acquire(backend, resources, store, shm, layout) {
		Ok(buffer) => {
			info!(
				target = "shmprobe.buffer",
				width,
				height,
				stride = layout.stride(),
				size = layout.size(),
				"shared memory buffer created"
			);
			Ok(buffer)
		}
		Err(err) => {
			let report = resources.rollback(mark, backend);
			warn!(
				target = "shmprobe.buffer",
				error = %err,
				released = report.released.len(),
				"buffer allocation failed; rolled back"
			);
			Err(err)
		}
	}
}

fn acquire<B, S>(backend: &mut B, resources: &mut ResourceArena, store: &mut S, shm: ObjectId, layout: BufferLayout) -> Result<ShmBuffer>
where
	B: DisplayBackend,
	S: BackingStore + ?Sized,
{
	let size = layout.size();
	let fd = store.create(size).map_err(Error::allocation(AllocationStep::Create))?;
	store.resize(fd.as_fd(), size).map_err(Error::allocation(AllocationStep::Resize))?;
	let mut region = store.map(fd.as_fd(), size).map_err(Error::allocation(AllocationStep::Map))?;

	pattern::fill(region.as_mut_slice(), layout.width(), layout.height());
	debug!(target = "shmprobe.buffer", width = layout.width(), height = layout.height(), "test pattern drawn");
	let mapping = resources.insert(Resource::Mapping(region));

	let pool = create(
		backend,
		Request::CreatePool {
			shm,
			fd: fd.as_fd(),
			size: layout.wire_size(),
		},
		ObjectKind::Pool,
	)?;
	resources.track(pool, ObjectKind::Pool);
	// The pool holds its own reference to the memory now.
	drop(fd);

	let buffer = create(
		backend,
		Request::CreateBuffer {
			pool,
			offset: 0,
			width: layout.wire_width(),
			height: layout.wire_height(),
			stride: layout.wire_stride(),
			format: BufferLayout::FORMAT,
		},
		ObjectKind::Buffer,
	)?;
	resources.track(buffer, ObjectKind::Buffer);

	Ok(ShmBuffer {
		layout,
		buffer,
		pool,
		mapping,
		releases: 0,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn layout_uses_four_bytes_per_pixel() {
		let layout = BufferLayout::new(800, 600).unwrap();
		assert_eq!(layout.stride(), 3200);
		assert_eq!(layout.size(), 1_920_000);
	}

	#[test]
	fn layout_rejects_empty_dimensions() {
		assert!(matches!(BufferLayout::new(0, 10), Err(Error::InvalidDimensions { width: 0, height: 10 })));
		assert!(matches!(BufferLayout::new(10, 0), Err(Error::InvalidDimensions { .. })));
	}

	#[test]
	fn layout_rejects_sizes_beyond_the_wire_range() {
		assert!(BufferLayout::new(u32::MAX, 1).is_err());
		assert!(BufferLayout::new(65_536, 65_536).is_err());
		assert!(BufferLayout::new(32_768, 16_384).is_err());
		assert!(BufferLayout::new(32_768, 16_383).is_ok());
	}

	#[test]
	fn size_and_stride_hold_for_assorted_dimensions() {
		for (w, h) in [(1, 1), (3, 7), (64, 64), (1920, 1080), (4096, 1)] {
			let layout = BufferLayout::new(w, h).unwrap();
			assert_eq!(layout.stride(), w * 4);
			assert_eq!(layout.size(), (w * h * 4) as usize);
		}
	}
}
