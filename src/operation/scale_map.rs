//! Zooming the large map via its on-screen plus/minus buttons

use super::{Operation, RoundOutcome};
use crate::controller::Controller;
use crate::error::NavResult;
use crate::match_image::{ImageMatcher, Rect, TemplateStore};
use std::sync::Arc;

/// On-screen strip holding the zoom buttons on the large-map view.
const BUTTON_RECT: Rect = Rect {
    x: 600,
    y: 960,
    w: 440,
    h: 60,
};

const BUTTON_MATCH_THRESHOLD: f32 = 0.7;

/// Clicks the large map's zoom button `|scale|` times: positive zooms in
/// (plus button), negative zooms out (minus button).
///
/// The matched button position is cached across rounds and dropped on
/// resume, since the map view may have moved while paused.
pub struct ScaleLargeMap<C> {
    ctrl: C,
    templates: Arc<TemplateStore>,
    im: ImageMatcher,
    scale: i32,
    clicks_done: u32,
    button_pos: Option<(u32, u32)>,
}

impl<C: Controller> ScaleLargeMap<C> {
    pub fn new(ctrl: C, templates: Arc<TemplateStore>, scale: i32) -> Self {
        Self {
            ctrl,
            templates,
            im: ImageMatcher::new(),
            scale,
            clicks_done: 0,
            button_pos: None,
        }
    }

    fn template_id(&self) -> &'static str {
        if self.scale > 0 { "plus" } else { "minus" }
    }

    /// Screenshot, crop the button strip and match the zoom template.
    /// `None` when the button is not visible this frame.
    async fn locate_button(&self) -> NavResult<Option<(u32, u32)>> {
        let screen = self.ctrl.screenshot().await?;
        let strip = image::imageops::crop_imm(
            &screen,
            BUTTON_RECT.x,
            BUTTON_RECT.y,
            BUTTON_RECT.w,
            BUTTON_RECT.h,
        )
        .to_image();
        let strip_gray = image::DynamicImage::ImageRgb8(strip).to_luma8();
        let template = self.templates.get(self.template_id())?;

        let results =
            self.im
                .match_template(&strip_gray, template, BUTTON_MATCH_THRESHOLD, None, false)?;
        Ok(results.max().map(|best| {
            let (cx, cy) = best.center();
            (BUTTON_RECT.x + cx, BUTTON_RECT.y + cy)
        }))
    }
}

impl<C: Controller> Operation for ScaleLargeMap<C> {
    fn name(&self) -> &str {
        "scale_large_map"
    }

    async fn execute_round(&mut self) -> NavResult<RoundOutcome> {
        let target = self.scale.unsigned_abs();
        if self.clicks_done >= target {
            return Ok(RoundOutcome::Success);
        }

        let pos = match self.button_pos {
            Some(pos) => pos,
            None => match self.locate_button().await? {
                Some(pos) => {
                    log::debug!("zoom button at ({}, {})", pos.0, pos.1);
                    self.button_pos = Some(pos);
                    pos
                }
                None => return Ok(RoundOutcome::Retry),
            },
        };

        self.ctrl.click(pos.0, pos.1).await?;
        self.clicks_done += 1;
        if self.clicks_done >= target {
            Ok(RoundOutcome::Success)
        } else {
            // Give the map time to settle between zoom steps.
            Ok(RoundOutcome::Wait)
        }
    }

    async fn on_resume(&mut self) -> NavResult<()> {
        self.button_pos = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NavError;
    use crate::operation::{OperationRunner, OperationStatus, PauseHandle};
    use image::{GrayImage, Rgb, RgbImage};
    use std::sync::Mutex;

    struct FakeController {
        screen: RgbImage,
        clicks: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl Controller for FakeController {
        async fn screenshot(&self) -> NavResult<RgbImage> {
            Ok(self.screen.clone())
        }

        async fn click(&self, x: u32, y: u32) -> NavResult<()> {
            self.clicks
                .lock()
                .map_err(|_| NavError::ControllerFailed {
                    call: "click".to_string(),
                    description: "click log poisoned".to_string(),
                })?
                .push((x, y));
            Ok(())
        }

        fn screen_dimensions(&self) -> (u32, u32) {
            self.screen.dimensions()
        }
    }

    /// Screen with a textured 40x40 button patch at (780, 970), i.e. at
    /// (180, 10) inside the button strip. Returns the screen and the
    /// matching template.
    fn screen_with_button() -> (RgbImage, GrayImage) {
        let mut screen = RgbImage::from_pixel(1920, 1080, Rgb([10, 10, 10]));
        for dy in 0..40u32 {
            for dx in 0..40u32 {
                let v = ((dx * 31 + dy * 17) % 251) as u8;
                screen.put_pixel(780 + dx, 970 + dy, Rgb([v, v, v]));
            }
        }
        let template =
            GrayImage::from_fn(40, 40, |x, y| image::Luma([((x * 31 + y * 17) % 251) as u8]));
        (screen, template)
    }

    fn store_with(id: &str, template: GrayImage) -> Arc<TemplateStore> {
        let mut store = TemplateStore::new();
        store.insert(id.to_string(), template);
        Arc::new(store)
    }

    #[tokio::test(start_paused = true)]
    async fn zooms_in_with_one_click_per_step() {
        let (screen, template) = screen_with_button();
        let clicks = Arc::new(Mutex::new(Vec::new()));
        let ctrl = FakeController {
            screen,
            clicks: Arc::clone(&clicks),
        };
        let mut op = ScaleLargeMap::new(ctrl, store_with("plus", template), 2);

        let runner = OperationRunner::new(PauseHandle::new());
        assert_eq!(runner.run(&mut op).await, OperationStatus::Success);

        let clicks = clicks.lock().unwrap();
        assert_eq!(clicks.as_slice(), &[(800, 990), (800, 990)]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_button_retries_until_budget_exhausted() {
        let blank = RgbImage::from_pixel(1920, 1080, Rgb([10, 10, 10]));
        let (_, template) = screen_with_button();
        let clicks = Arc::new(Mutex::new(Vec::new()));
        let ctrl = FakeController {
            screen: blank,
            clicks: Arc::clone(&clicks),
        };
        let mut op = ScaleLargeMap::new(ctrl, store_with("minus", template), -1);

        let runner = OperationRunner::new(PauseHandle::new());
        assert_eq!(runner.run(&mut op).await, OperationStatus::Fail);
        assert!(clicks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_template_is_a_fatal_asset_error() {
        let (screen, _) = screen_with_button();
        let ctrl = FakeController {
            screen,
            clicks: Arc::new(Mutex::new(Vec::new())),
        };
        // Store lacks the "plus" template entirely.
        let mut op = ScaleLargeMap::new(ctrl, Arc::new(TemplateStore::new()), 1);

        let err = op.locate_button().await.unwrap_err();
        assert!(matches!(err, NavError::TemplateNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_discards_the_cached_button_position() {
        let (screen, template) = screen_with_button();
        let ctrl = FakeController {
            screen,
            clicks: Arc::new(Mutex::new(Vec::new())),
        };
        let mut op = ScaleLargeMap::new(ctrl, store_with("plus", template), 3);

        op.execute_round().await.unwrap();
        assert!(op.button_pos.is_some());

        op.on_resume().await.unwrap();
        assert!(op.button_pos.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_scale_succeeds_without_clicking() {
        let (screen, template) = screen_with_button();
        let clicks = Arc::new(Mutex::new(Vec::new()));
        let ctrl = FakeController {
            screen,
            clicks: Arc::clone(&clicks),
        };
        let mut op = ScaleLargeMap::new(ctrl, store_with("plus", template), 0);

        assert_eq!(op.execute_round().await.unwrap(), RoundOutcome::Success);
        assert!(clicks.lock().unwrap().is_empty());
    }
}
