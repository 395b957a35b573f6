//! Fixed session parameters.
//!
//! The client takes no flags; these values are the whole configuration
//! surface. Tests use the builders to shrink the window.

/// Parameters of the window and buffer the client creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Buffer and window width in pixels.
	pub width: u32,
	/// Buffer and window height in pixels.
	pub height: u32,
	/// Toplevel title.
	pub title: String,
	/// Toplevel application id.
	pub app_id: String,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			width: 800,
			height: 600,
			title: "SHM Test Client".to_string(),
			app_id: "shmprobe".to_string(),
		}
	}
}

impl ClientConfig {
	/// Sets the buffer and window size.
	pub fn with_size(mut self, width: u32, height: u32) -> Self {
		self.width = width;
		self.height = height;
		self
	}

	/// Sets the toplevel title.
	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.title = title.into();
		self
	}
}
