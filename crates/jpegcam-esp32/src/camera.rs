//! esp32-camera driver binding.
//!
//! Wraps `esp_camera_init` / `esp_camera_fb_get` / `esp_camera_fb_return`.
//! The driver is configured with a single frame buffer, so the handle returned
//! by a capture is the only one that can exist until it is returned.

use std::ptr::NonNull;

use esp_idf_svc::sys::camera::{
    camera_config_t, camera_fb_location_t_CAMERA_FB_IN_PSRAM, camera_fb_t,
    camera_grab_mode_t_CAMERA_GRAB_WHEN_EMPTY, esp_camera_fb_get, esp_camera_fb_return,
    esp_camera_init, framesize_t, framesize_t_FRAMESIZE_CIF, framesize_t_FRAMESIZE_QQVGA,
    framesize_t_FRAMESIZE_QVGA, framesize_t_FRAMESIZE_SVGA, framesize_t_FRAMESIZE_SXGA,
    framesize_t_FRAMESIZE_UXGA, framesize_t_FRAMESIZE_VGA, framesize_t_FRAMESIZE_XGA,
    ledc_channel_t_LEDC_CHANNEL_0, ledc_timer_t_LEDC_TIMER_0, pixformat_t_PIXFORMAT_JPEG,
};
use esp_idf_svc::sys::ESP_OK;
use jpegcam_core::frame::ERR_INVALID_ARG;
use jpegcam_core::{CameraConfig, CameraDriver, FrameSize};
use log::{error, info};

/// The on-board camera.
#[derive(Debug, Default)]
pub struct EspCamera {
    initialized: bool,
}

impl EspCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

fn frame_size(size: FrameSize) -> framesize_t {
    match size {
        FrameSize::Qqvga => framesize_t_FRAMESIZE_QQVGA,
        FrameSize::Qvga => framesize_t_FRAMESIZE_QVGA,
        FrameSize::Cif => framesize_t_FRAMESIZE_CIF,
        FrameSize::Vga => framesize_t_FRAMESIZE_VGA,
        FrameSize::Svga => framesize_t_FRAMESIZE_SVGA,
        FrameSize::Xga => framesize_t_FRAMESIZE_XGA,
        FrameSize::Sxga => framesize_t_FRAMESIZE_SXGA,
        FrameSize::Uxga => framesize_t_FRAMESIZE_UXGA,
    }
}

fn driver_config(config: &CameraConfig) -> Result<camera_config_t, i32> {
    let pins = &config.pins;
    let mut raw = camera_config_t::default();

    raw.pin_pwdn = pins.pwdn;
    raw.pin_reset = pins.reset;
    raw.pin_xclk = pins.xclk;
    // SCCB pins sit in anonymous unions in driver v2.x.
    raw.__bindgen_anon_1.pin_sccb_sda = pins.sccb_sda;
    raw.__bindgen_anon_2.pin_sccb_scl = pins.sccb_scl;
    raw.pin_d0 = pins.data[0];
    raw.pin_d1 = pins.data[1];
    raw.pin_d2 = pins.data[2];
    raw.pin_d3 = pins.data[3];
    raw.pin_d4 = pins.data[4];
    raw.pin_d5 = pins.data[5];
    raw.pin_d6 = pins.data[6];
    raw.pin_d7 = pins.data[7];
    raw.pin_vsync = pins.vsync;
    raw.pin_href = pins.href;
    raw.pin_pclk = pins.pclk;

    raw.xclk_freq_hz = i32::try_from(config.xclk_freq_hz).map_err(|_| ERR_INVALID_ARG)?;
    raw.ledc_timer = ledc_timer_t_LEDC_TIMER_0;
    raw.ledc_channel = ledc_channel_t_LEDC_CHANNEL_0;

    raw.pixel_format = pixformat_t_PIXFORMAT_JPEG;
    raw.frame_size = frame_size(config.frame_size);
    raw.jpeg_quality = i32::from(config.jpeg_quality);
    raw.fb_count = usize::from(config.fb_count);
    raw.fb_location = camera_fb_location_t_CAMERA_FB_IN_PSRAM;
    raw.grab_mode = camera_grab_mode_t_CAMERA_GRAB_WHEN_EMPTY;

    Ok(raw)
}

impl CameraDriver for EspCamera {
    type Handle = NonNull<camera_fb_t>;

    fn init(&mut self, config: &CameraConfig) -> Result<(), i32> {
        let raw = driver_config(config)?;
        let err = unsafe { esp_camera_init(&raw) };
        if err != ESP_OK {
            error!("Camera init failed with error 0x{:x}", err);
            return Err(err);
        }

        self.initialized = true;
        info!("Camera driver initialized");
        Ok(())
    }

    fn capture(&mut self) -> Option<Self::Handle> {
        if !self.initialized {
            return None;
        }
        NonNull::new(unsafe { esp_camera_fb_get() })
    }

    fn data<'a>(&'a self, handle: &'a Self::Handle) -> &'a [u8] {
        let fb = handle.as_ptr();
        // camera_fb_t is packed; read its fields unaligned.
        unsafe {
            let buf = std::ptr::addr_of!((*fb).buf).read_unaligned();
            let len = std::ptr::addr_of!((*fb).len).read_unaligned();
            if buf.is_null() {
                return &[];
            }
            std::slice::from_raw_parts(buf, len)
        }
    }

    fn release(&mut self, handle: Self::Handle) {
        unsafe { esp_camera_fb_return(handle.as_ptr()) };
    }
}
