use anyhow::{Context, Result};

use super::GpuInit;
use super::errors::{capture_errors, format_features, log_uncaptured_errors};

/// Adapter, device and queue shared by every render target.
///
/// Surfaces live elsewhere ([`WindowSurface`](super::WindowSurface)) so a
/// headless server never needs one.
pub struct GpuDevice {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuDevice {
    pub fn create_instance(init: &GpuInit) -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        })
    }

    /// Opens a device on `instance`.
    ///
    /// With a window, pass its surface so the adapter is one that can
    /// present to it.
    pub async fn new(
        instance: wgpu::Instance,
        init: &GpuInit,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = pick_adapter(&instance, init, compatible_surface).await?;

        let info = adapter.get_info();
        log::info!(
            "adapter '{}' ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        // Lets texture usages follow what the adapter really supports.
        let required_features =
            adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vellum device"),
                required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .with_context(|| format!("adapter '{}' refused to open a device", info.name))?;
        log_uncaptured_errors(&device);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    pub async fn headless(init: &GpuInit) -> Result<Self> {
        Self::new(Self::create_instance(init), init, None).await
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub fn format_features(&self, format: wgpu::TextureFormat) -> wgpu::TextureFormatFeatures {
        format_features(&self.adapter, &self.device, format)
    }

    /// Whether textures of `format` may be created with all of `usages`.
    pub fn supports_usages(&self, format: wgpu::TextureFormat, usages: wgpu::TextureUsages) -> bool {
        self.format_features(format).allowed_usages.contains(usages)
    }

    /// Runs `op` on the device, turning GPU validation and out-of-memory
    /// errors into an `Err` that names `what`.
    pub fn checked<T>(&self, what: &str, op: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
        capture_errors(&self.device, what, || op(&self.device))
    }

    /// Finishes and submits `encoder`; invalid commands come back as `Err`.
    pub fn submit(&self, what: &str, encoder: wgpu::CommandEncoder) -> Result<()> {
        self.checked(what, |_| {
            self.queue.submit(Some(encoder.finish()));
        })
    }

    /// Blocks until all submitted work has executed.
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .context("failed waiting for GPU work to complete")?;
        Ok(())
    }
}

async fn pick_adapter(
    instance: &wgpu::Instance,
    init: &GpuInit,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter> {
    let options = |force_fallback_adapter| wgpu::RequestAdapterOptions {
        power_preference: init.power_preference,
        compatible_surface,
        force_fallback_adapter,
    };

    match instance.request_adapter(&options(false)).await {
        Ok(adapter) => return Ok(adapter),
        Err(err) if !init.allow_software => {
            return Err(err).context("no suitable GPU adapter");
        }
        Err(err) => log::warn!("no hardware adapter ({err}); trying a software one"),
    }

    instance
        .request_adapter(&options(true))
        .await
        .context("no suitable GPU adapter, hardware or software")
}
