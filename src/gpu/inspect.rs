//! Capability dumps for the selected adapter and the created device.

pub(crate) fn log_adapter(adapter: &wgpu::Adapter) {
    let info = adapter.get_info();
    log::info!("Adapter properties:");
    log::info!(" - name: {}", info.name);
    log::info!(" - vendor id: {:#06x}", info.vendor);
    log::info!(" - device id: {:#06x}", info.device);
    log::info!(" - device type: {:?}", info.device_type);
    log::info!(" - backend: {:?}", info.backend);
    if !info.driver.is_empty() {
        log::info!(" - driver: {} {}", info.driver, info.driver_info);
    }

    log_limits("Adapter", &adapter.limits());
    log::info!("Adapter features: {:?}", adapter.features());
}

pub(crate) fn log_device(device: &wgpu::Device) {
    log_limits("Device", &device.limits());
    log::info!("Device features: {:?}", device.features());
}

fn log_limits(owner: &str, limits: &wgpu::Limits) {
    log::info!("{owner} limits:");
    log::info!(" - maxTextureDimension1D: {}", limits.max_texture_dimension_1d);
    log::info!(" - maxTextureDimension2D: {}", limits.max_texture_dimension_2d);
    log::info!(" - maxTextureDimension3D: {}", limits.max_texture_dimension_3d);
    log::info!(" - maxTextureArrayLayers: {}", limits.max_texture_array_layers);
    log::info!(" - maxBindGroups: {}", limits.max_bind_groups);
    log::info!(" - maxUniformBufferBindingSize: {}", limits.max_uniform_buffer_binding_size);
    log::info!(" - maxStorageBufferBindingSize: {}", limits.max_storage_buffer_binding_size);
    log::info!(" - maxVertexBuffers: {}", limits.max_vertex_buffers);
    log::info!(" - maxVertexAttributes: {}", limits.max_vertex_attributes);
    log::info!(" - maxComputeWorkgroupSizeX: {}", limits.max_compute_workgroup_size_x);
}
