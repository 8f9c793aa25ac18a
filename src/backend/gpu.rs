//! wgpu compute backend.
//!
//! Uploads the node's pixel buffer, runs a compute shader equivalent of
//! the filter chain (contrast, brightness, saturate, blur), and writes
//! the result back. Every failure mode is caught locally and surfaced
//! through the outcome so the caller can retry via CSS; nothing here
//! panics the pipeline.

use std::time::Instant;

use wgpu::util::DeviceExt;

use super::{ApplyOutcome, GpuDiagnostics, RenderBackend, RenderMetrics};
use crate::compose::{FilterOp, VisualTransformDescriptor};
use crate::document::{Document, NodeId, PixelBuffer};
use crate::error::EngineError;

const ENABLE_LOGS: bool = true;
use crate::{log_info, log_warn};

const WORKGROUP_DIM: u32 = 8;
/// Hard cap from the wgpu default limits on workgroups per dimension.
const MAX_WORKGROUPS: u32 = 65_535;

const SHADER: &str = r#"
struct Params {
    contrast: f32,
    brightness: f32,
    saturate: f32,
    blur_radius: i32,
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

fn load_rgba(i: u32) -> vec4<f32> {
    let p = src[i];
    return vec4<f32>(
        f32(p & 0xffu),
        f32((p >> 8u) & 0xffu),
        f32((p >> 16u) & 0xffu),
        f32((p >> 24u) & 0xffu)) / 255.0;
}

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) {
        return;
    }
    let idx = gid.y * params.width + gid.x;

    var color = vec4<f32>(0.0);
    if (params.blur_radius > 0) {
        var count = 0.0;
        for (var dy = -params.blur_radius; dy <= params.blur_radius; dy = dy + 1) {
            for (var dx = -params.blur_radius; dx <= params.blur_radius; dx = dx + 1) {
                let sx = clamp(i32(gid.x) + dx, 0, i32(params.width) - 1);
                let sy = clamp(i32(gid.y) + dy, 0, i32(params.height) - 1);
                color = color + load_rgba(u32(sy) * params.width + u32(sx));
                count = count + 1.0;
            }
        }
        color = color / count;
    } else {
        color = load_rgba(idx);
    }

    var rgb = (color.rgb - vec3<f32>(0.5)) * params.contrast + vec3<f32>(0.5);
    rgb = rgb * params.brightness;
    let luma = dot(rgb, vec3<f32>(0.299, 0.587, 0.114));
    rgb = clamp(mix(vec3<f32>(luma), rgb, params.saturate), vec3<f32>(0.0), vec3<f32>(1.0));

    dst[idx] = (u32(color.a * 255.0) << 24u)
        | (u32(rgb.b * 255.0) << 16u)
        | (u32(rgb.g * 255.0) << 8u)
        | u32(rgb.r * 255.0);
}
"#;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    contrast: f32,
    brightness: f32,
    saturate: f32,
    blur_radius: i32,
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl GpuBackend {
    /// Create a device and compile the pipeline. Returns
    /// `EngineError::GpuUnavailable` when no adapter or device exists;
    /// callers treat that as "stay on CSS".
    pub fn new() -> Result<Self, EngineError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| EngineError::GpuUnavailable("no suitable adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("readlens-gpu"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|err| EngineError::GpuUnavailable(err.to_string()))?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("readlens-filter-chain"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("readlens-filter-bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("readlens-filter-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("readlens-filter-pipeline"),
            layout: Some(&layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let info = adapter.get_info();
        log_info!("gpu backend ready on {} ({:?})", info.name, info.backend);

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
        })
    }

    fn run_filter(&self, buffer: &PixelBuffer, params: Params) -> Result<Vec<u8>, EngineError> {
        let groups_x = buffer.width.div_ceil(WORKGROUP_DIM);
        let groups_y = buffer.height.div_ceil(WORKGROUP_DIM);
        if groups_x > MAX_WORKGROUPS || groups_y > MAX_WORKGROUPS {
            return Err(EngineError::GpuFailure(format!(
                "buffer {}x{} exceeds dispatch limits",
                buffer.width, buffer.height
            )));
        }

        let byte_len = buffer.data.len() as u64;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let src = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("readlens-src"),
                contents: &buffer.data,
                usage: wgpu::BufferUsages::STORAGE,
            });
        let dst = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readlens-dst"),
            size: byte_len,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readlens-staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("readlens-params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("readlens-filter-bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: src.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: dst.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readlens-filter-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("readlens-filter-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        encoder.copy_buffer_to_buffer(&dst, 0, &staging, 0, byte_len);
        self.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(EngineError::GpuFailure(err.to_string()));
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(EngineError::GpuFailure(err.to_string())),
            Err(_) => {
                return Err(EngineError::GpuFailure("map callback dropped".into()));
            }
        }

        let out = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(out)
    }
}

/// Extract the shader-relevant magnitudes from a descriptor.
fn shader_params(descriptor: &VisualTransformDescriptor, width: u32, height: u32) -> Params {
    let mut params = Params {
        contrast: 1.0,
        brightness: 1.0,
        saturate: 1.0,
        blur_radius: 0,
        width,
        height,
        _pad0: 0,
        _pad1: 0,
    };
    for op in &descriptor.ops {
        match op {
            FilterOp::Contrast(v) => params.contrast = *v as f32,
            FilterOp::Brightness(v) => params.brightness = *v as f32,
            FilterOp::Saturate(v) => params.saturate = *v as f32,
            FilterOp::Blur(px) => params.blur_radius = px.ceil() as i32,
            // Edge outlines stay a style concern; the saturate term
            // already carries the enhancement magnitude.
            FilterOp::DropShadow { .. } => {}
        }
    }
    params
}

impl RenderBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn apply(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        descriptor: &VisualTransformDescriptor,
    ) -> ApplyOutcome {
        let started = Instant::now();

        let buffer = match doc.get(node).and_then(|n| n.pixels.clone()) {
            Some(buffer) => buffer,
            None => {
                // Nothing to upload; let CSS handle pure-style targets.
                return ApplyOutcome::failure("node has no pixel buffer");
            }
        };

        let params = shader_params(descriptor, buffer.width, buffer.height);
        match self.run_filter(&buffer, params) {
            Ok(data) => {
                doc.apply_rendered_pixels(
                    node,
                    PixelBuffer::new(buffer.width, buffer.height, data),
                );
                if let (Some(target), Some(typography)) =
                    (doc.get_mut(node), descriptor.typography.as_ref())
                {
                    target.set_style(
                        "letter-spacing",
                        &format!("{:.3}em", typography.letter_spacing_em),
                    );
                    target.set_style("line-height", &format!("{:.2}", typography.line_height));
                    target.set_style("font-weight", &typography.font_weight.to_string());
                }

                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                ApplyOutcome::success(RenderMetrics {
                    processing_time_ms: elapsed_ms,
                    fps: Some(if elapsed_ms > 0.0 { 1000.0 / elapsed_ms } else { 1000.0 }),
                    fallback_triggered: false,
                })
            }
            Err(err) => {
                log_warn!("gpu apply failed for node {node:?}: {err}");
                ApplyOutcome::failure(err.to_string())
            }
        }
    }
}

/// Probe the adapter for vendor/renderer/version/feature strings.
pub fn diagnostics() -> GpuDiagnostics {
    let instance = wgpu::Instance::default();
    let Some(adapter) =
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
    else {
        return GpuDiagnostics::unavailable();
    };

    let info = adapter.get_info();
    let extensions = adapter
        .features()
        .iter_names()
        .map(|(name, _)| name.to_string())
        .collect();

    GpuDiagnostics {
        available: true,
        vendor: format!("{:#06x}", info.vendor),
        renderer: info.name,
        version: format!("{:?} {}", info.backend, info.driver_info),
        extensions,
    }
}
