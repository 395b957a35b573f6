//! Anonymous POSIX shared memory backing the client's buffer.
//!
//! The compositor may read a mapped region at any time after the buffer has
//! been attached and committed. Nothing here synchronizes writes against that
//! read; the client only writes before the first attach.

use std::ffi::{CStr, CString};
use std::io;
use std::mem::ManuallyDrop;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, warn};

/// Source of file-backed memory for shared buffers.
///
/// The three operations are separate so each step fails on its own.
pub trait BackingStore {
	/// Creates an anonymous backing store intended to hold `size` bytes.
	fn create(&mut self, size: usize) -> io::Result<OwnedFd>;

	/// Sets the length of the backing store to `size` bytes.
	fn resize(&mut self, fd: BorrowedFd<'_>, size: usize) -> io::Result<()>;

	/// Maps `size` bytes of the backing store read-write and shared.
	fn map(&mut self, fd: BorrowedFd<'_>, size: usize) -> io::Result<MappedRegion>;
}

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// `shm_open` + `shm_unlink` + `ftruncate` + `mmap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixShm;

impl PosixShm {
	fn next_name() -> String {
		format!("/shmprobe-{}-{}", std::process::id(), SEQUENCE.fetch_add(1, Ordering::Relaxed))
	}
}

impl BackingStore for PosixShm {
	fn create(&mut self, _size: usize) -> io::Result<OwnedFd> {
		open_unlinked(&Self::next_name())
	}

	fn resize(&mut self, fd: BorrowedFd<'_>, size: usize) -> io::Result<()> {
		let len = libc::off_t::try_from(size).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
		// SAFETY: `fd` is a live descriptor borrowed for the duration of the call.
		if unsafe { libc::ftruncate(fd.as_raw_fd(), len) } < 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}

	fn map(&mut self, fd: BorrowedFd<'_>, size: usize) -> io::Result<MappedRegion> {
		// SAFETY: a fresh shared mapping of a descriptor we hold; no existing memory is aliased.
		let addr = unsafe {
			libc::mmap(
				ptr::null_mut(),
				size,
				libc::PROT_READ | libc::PROT_WRITE,
				libc::MAP_SHARED,
				fd.as_raw_fd(),
				0,
			)
		};
		if addr == libc::MAP_FAILED {
			return Err(io::Error::last_os_error());
		}
		let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;
		Ok(MappedRegion { ptr, len: size })
	}
}

/// A read-write shared mapping owned by this process.
///
/// Unmapped explicitly through [`MappedRegion::unmap`]; dropping an
/// unreleased region unmaps it as a last resort.
#[derive(Debug)]
pub struct MappedRegion {
	ptr: NonNull<u8>,
	len: usize,
}

impl MappedRegion {
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn as_slice(&self) -> &[u8] {
		// SAFETY: the mapping is live and `len` bytes long for as long as `self` exists.
		unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
	}

	pub fn as_mut_slice(&mut self) -> &mut [u8] {
		// SAFETY: as above, and `&mut self` guarantees no other slice of this region exists.
		unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
	}

	/// Removes the mapping from the address space.
	pub fn unmap(self) -> io::Result<()> {
		let this = ManuallyDrop::new(self);
		// SAFETY: `this` is never used again and its destructor will not run.
		unsafe { munmap(this.ptr, this.len) }
	}
}

impl Drop for MappedRegion {
	fn drop(&mut self) {
		warn!(target = "shmprobe.buffer", len = self.len, "mapping dropped without explicit release");
		// SAFETY: the region is still mapped; drop runs at most once.
		if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
			warn!(target = "shmprobe.buffer", error = %e, "munmap failed");
		}
	}
}

/// Opens a fresh shared-memory object under `name` and removes the name again.
fn open_unlinked(name: &str) -> io::Result<OwnedFd> {
	let c_name = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

	// SAFETY: `c_name` is a valid NUL-terminated string for the duration of the call.
	let raw = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR | libc::O_CREAT | libc::O_EXCL, 0o600) };
	if raw < 0 {
		return Err(io::Error::last_os_error());
	}
	// SAFETY: `shm_open` returned a fresh descriptor nobody else owns.
	let fd = unsafe { OwnedFd::from_raw_fd(raw) };

	unlink(&c_name);
	debug!(target = "shmprobe.buffer", name, fd = fd.as_raw_fd(), "backing store created");
	Ok(fd)
}

/// Removes a backing-store name. The open descriptor keeps the memory alive,
/// so a failure only leaves the name behind and is not fatal.
fn unlink(name: &CStr) -> bool {
	// SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
	if unsafe { libc::shm_unlink(name.as_ptr()) } < 0 {
		let err = io::Error::last_os_error();
		warn!(target = "shmprobe.buffer", name = ?name, error = %err, "shm_unlink failed; name left behind");
		return false;
	}
	true
}

/// # Safety
/// `ptr..ptr+len` must be a live mapping created by `mmap` and not used afterwards.
unsafe fn munmap(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
	// SAFETY: upheld by the caller.
	if unsafe { libc::munmap(ptr.as_ptr().cast(), len) } < 0 {
		return Err(io::Error::last_os_error());
	}
	Ok(())
}
