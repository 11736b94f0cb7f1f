/*
*   Adapter and device requests are asynchronous in wgpu. On the desktop they are
*   driven to completion right where setup asks for them, so main() can stay a
*   plain blocking loop. On the web the browser owns the loop instead and
*   `run_web` is the entry point.
*/
#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    learn_webgpu::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
