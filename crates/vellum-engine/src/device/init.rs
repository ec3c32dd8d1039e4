/// How the server picks its adapter and sets up attachments.
#[derive(Debug, Clone)]
pub struct GpuInit {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,

    /// Fall back to a software adapter (llvmpipe, WARP) when no hardware
    /// adapter is found. Headless servers on build machines rely on this.
    pub allow_software: bool,

    pub required_limits: wgpu::Limits,

    /// Depth/stencil attachment paired with every color target, live or
    /// off-screen. Must be a combined depth + stencil format.
    pub depth_stencil_format: wgpu::TextureFormat,

    pub surface: SurfacePreferences,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            allow_software: true,
            required_limits: wgpu::Limits::default(),
            depth_stencil_format: wgpu::TextureFormat::Depth24PlusStencil8,
            surface: SurfacePreferences::default(),
        }
    }
}

/// Window surface settings. Ignored by headless servers.
#[derive(Debug, Clone)]
pub struct SurfacePreferences {
    pub srgb: bool,

    /// FIFO paces flushes to the display refresh, which clients use for timing.
    pub present_mode: wgpu::PresentMode,

    /// Falls back to the first supported mode when unset or unsupported.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub max_frame_latency: u32,
}

impl Default for SurfacePreferences {
    fn default() -> Self {
        Self {
            srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            max_frame_latency: 2,
        }
    }
}
