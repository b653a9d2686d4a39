//! seatwire - print the input events of a seat
//!
//! Brings up the udev/libinput pipeline on one seat and logs every
//! normalized event until SIGTERM/SIGINT/SIGHUP.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

fn setup_signal_handlers() {
    unsafe {
        libc::signal(
            libc::SIGTERM,
            shutdown_signal_handler as *const () as libc::sighandler_t,
        );
        libc::signal(
            libc::SIGINT,
            shutdown_signal_handler as *const () as libc::sighandler_t,
        );
        libc::signal(
            libc::SIGHUP,
            shutdown_signal_handler as *const () as libc::sighandler_t,
        );
    }
}

extern "C" fn shutdown_signal_handler(_signo: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Print help message
fn print_help() {
    println!(
        r#"seatwire {} - seat input pipeline monitor

USAGE:
    seatwire [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -s, --seat NAME         Seat to bind (overrides config, XDG_SEAT still wins)

ENVIRONMENT:
    XDG_SEAT                Seat name
    SEATWIRE_CONFIG         Config file path
    RUST_LOG                Log filter (overrides [log] level)

CONFIG:
    $SEATWIRE_CONFIG, ~/.config/seatwire/config.toml, /etc/seatwire/config.toml"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Value following `--seat`/`-s`, or given as `--seat=NAME`
fn seat_arg(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--seat=") {
            return Some(value.to_string());
        }
        if arg == "--seat" || arg == "-s" {
            return iter.next().cloned();
        }
    }
    None
}

#[cfg(target_os = "linux")]
mod app {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use log::{debug, info};

    use seatwire::bus::{PointerMotion, SeatHandler};
    use seatwire::input::{ButtonState, KeyState, ScrollAxis};
    #[cfg(not(feature = "seatd"))]
    use seatwire::DirectGatekeeper;
    use seatwire::{logging, Config, EventLoop, SharedGatekeeper, SystemPipeline};

    use super::shutdown_requested;

    /// Seat that logs every event it receives
    struct LogSeat;

    impl SeatHandler for LogSeat {
        fn pointer_motion(&mut self, time: u32, motion: PointerMotion<'_>) {
            match motion {
                PointerMotion::Relative { dx, dy } => debug!("[{}] motion {:+.2} {:+.2}", time, dx, dy),
                PointerMotion::Absolute(abs) => {
                    debug!("[{}] motion-absolute {:.3} {:.3}", time, abs.x(1), abs.y(1))
                }
            }
        }

        fn pointer_scroll(&mut self, time: u32, axis: ScrollAxis, amount: f64) {
            info!("[{}] scroll {:?} {:+.2}", time, axis, amount);
        }

        fn pointer_button(&mut self, time: u32, button: u32, state: ButtonState) {
            info!("[{}] button {} {:?}", time, button, state);
        }

        fn keyboard_key(&mut self, time: u32, key: u32, state: KeyState) {
            info!("[{}] key {} {:?}", time, key, state);
        }
    }

    pub fn run(seat_override: Option<String>) -> Result<()> {
        let cfg = Config::load();
        logging::init(&cfg.log.level);
        info!("seatwire starting...");

        let seat = seat_override.or_else(|| cfg.seat_name().map(str::to_owned));
        let mut reactor = EventLoop::new().context("Failed to create event loop")?;

        #[cfg(feature = "seatd")]
        let seat_session = {
            info!("Opening libseat session...");
            Rc::new(RefCell::new(
                seatwire::session::SeatSession::open().context("Failed to open libseat session")?,
            ))
        };

        #[cfg(feature = "seatd")]
        let gatekeeper: SharedGatekeeper = seatwire::session::SeatGatekeeper::new(seat_session.clone()).into_shared();
        #[cfg(not(feature = "seatd"))]
        let gatekeeper: SharedGatekeeper = DirectGatekeeper::new().into_shared();

        let mut pipeline = SystemPipeline::system(gatekeeper, seat, cfg.monitor.display_controller);

        #[cfg(feature = "seatd")]
        let session_source = {
            // Enable arrives asynchronously; take it before opening devices
            seat_session.borrow_mut().dispatch().context("libseat dispatch")?;
            while seat_session.borrow().try_recv_event().is_some() {}
            seatwire::session::register(&seat_session, &mut reactor, pipeline.activation())
                .context("Failed to register libseat session")?
        };

        pipeline.bus().attach_seat(Rc::new(RefCell::new(LogSeat)));
        pipeline
            .init(&mut reactor)
            .context("Failed to initialize input pipeline")?;
        #[cfg(feature = "seatd")]
        if !seat_session.borrow().is_active() {
            pipeline.activation().emit(&false);
        }
        info!(
            "Bound to {} ({})",
            pipeline.input().seat_name().unwrap_or("?"),
            pipeline.state()
        );

        // Notify systemd that we're ready
        let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

        while !shutdown_requested() {
            reactor
                .dispatch(Some(Duration::from_millis(500)))
                .context("Event loop failed")?;
        }

        info!("Shutdown requested, stopping...");
        let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);

        pipeline.terminate(&mut reactor);
        #[cfg(feature = "seatd")]
        reactor.deregister(session_source);
        Ok(())
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("seatwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    setup_signal_handlers();

    #[cfg(target_os = "linux")]
    {
        app::run(seat_arg(&args[1..]))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = seat_arg;
        anyhow::bail!("seatwire needs udev and libinput (Linux only)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seat_arg() {
        assert_eq!(seat_arg(&args(&["--seat", "seat1"])), Some("seat1".to_string()));
        assert_eq!(seat_arg(&args(&["-s", "seat2"])), Some("seat2".to_string()));
        assert_eq!(seat_arg(&args(&["--seat=seat3"])), Some("seat3".to_string()));
        assert_eq!(seat_arg(&args(&["--seat"])), None);
        assert_eq!(seat_arg(&args(&[])), None);
    }
}
