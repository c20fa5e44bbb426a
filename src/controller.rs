// Capability seam towards the game session: screenshots in, clicks out.
use crate::error::NavResult;
use image::RgbImage;

/// Trait defining the narrow game-control capabilities operations depend on.
///
/// Implementations (window capture, remote device, emulator) live outside
/// this crate. Calls are blocking by design: there is exactly one game
/// session to drive, so rounds stall on capture and input.
#[allow(async_fn_in_trait)]
pub trait Controller: Send + Sync {
    /// Capture the current game frame as a decoded RGB raster.
    async fn screenshot(&self) -> NavResult<RgbImage>;

    /// Click at pixel coordinates in screen space.
    async fn click(&self, x: u32, y: u32) -> NavResult<()>;

    /// Width and height of the game window in pixels.
    fn screen_dimensions(&self) -> (u32, u32);
}
