use oxws::{
    CompositorError, Result,
    config::DemoConfig,
    state::{Oxws, init_wayland_listener},
};
use smithay::reexports::{
    calloop::{
        EventLoop,
        timer::{TimeoutAction, Timer},
    },
    wayland_server::Display,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const OUTPUT_WIDTH: i32 = 1920;
const OUTPUT_HEIGHT: i32 = 1080;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DemoConfig::from_env()?;

    let mut event_loop: EventLoop<Oxws> =
        EventLoop::try_new().map_err(|e| CompositorError::EventLoop(e.to_string()))?;

    let display: Display<Oxws> =
        Display::new().map_err(|e| CompositorError::Backend(e.to_string()))?;

    let (mut state, mut display) = Oxws::new(display, event_loop.handle())?;

    let socket_name = init_wayland_listener(&event_loop.handle())?;

    for name in &config.outputs {
        state.add_output(
            name.clone(),
            OUTPUT_WIDTH,
            OUTPUT_HEIGHT,
            config.workspaces_per_output,
        );
    }

    unsafe { std::env::set_var("WAYLAND_DISPLAY", &socket_name) };
    info!(?socket_name, "listening");

    if let Some(cmd) = &config.spawn {
        let mut child = std::process::Command::new(cmd).spawn()?;
        event_loop
            .handle()
            .insert_source(Timer::immediate(), move |_, _, state| {
                match child.try_wait() {
                    Ok(None) => TimeoutAction::ToDuration(Duration::from_millis(100)),
                    Ok(Some(status)) => {
                        info!(%status, "client exited");
                        state.running = false;
                        TimeoutAction::Drop
                    }
                    Err(err) => {
                        warn!(%err, "lost track of client");
                        state.running = false;
                        TimeoutAction::Drop
                    }
                }
            })
            .map_err(|e| CompositorError::EventLoop(e.error.to_string()))?;
    }

    while state.running {
        display.dispatch_clients(&mut state)?;
        display.flush_clients()?;

        event_loop
            .dispatch(Some(Duration::from_millis(16)), &mut state)
            .map_err(|e| CompositorError::EventLoop(e.to_string()))?;
    }

    state.shutdown();
    display.flush_clients()?;

    Ok(())
}
