use std::sync::Arc;

use anyhow::Result;

/// Runs `op` with validation and out-of-memory errors captured.
///
/// wgpu's default handler panics on either. Inside this scope they come back
/// as an error that starts with `what`.
pub fn capture_errors<T>(device: &wgpu::Device, what: &str, op: impl FnOnce() -> T) -> Result<T> {
    let oom = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let value = op();

    // Scopes pop innermost first.
    let invalid = pollster::block_on(validation.pop());
    let exhausted = pollster::block_on(oom.pop());
    if let Some(err) = invalid.or(exhausted) {
        anyhow::bail!("{what}: {err}");
    }
    Ok(value)
}

/// Logs errors raised outside any scope instead of panicking.
pub(crate) fn log_uncaptured_errors(device: &wgpu::Device) {
    device.on_uncaptured_error(Arc::new(|err: wgpu::Error| {
        log::error!("uncaptured GPU error: {err}");
    }));
}

/// What `device` will accept for `format`.
///
/// Adapter-specific features apply when the device asked for them or the
/// adapter is downlevel; otherwise only the WebGPU guarantees do.
pub fn format_features(
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> wgpu::TextureFormatFeatures {
    let adapter_specific = device
        .features()
        .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
    let downlevel = !adapter
        .get_downlevel_capabilities()
        .flags
        .contains(wgpu::DownlevelFlags::WEBGPU_TEXTURE_FORMAT_SUPPORT);

    if adapter_specific || downlevel {
        adapter.get_texture_format_features(format)
    } else {
        format.guaranteed_format_features(device.features())
    }
}
