//! main.rs - Desktop simulator for the particle grid
//! Stands in for the panel, touch, and network backends of the device

use std::convert::Infallible;
use std::error::Error;
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Circle, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window};

use particle_grid::config::{BoundaryShape, SCREEN_HEIGHT, SCREEN_WIDTH};
use particle_grid::palette;
use particle_grid::payload::{self, DisplayHeader, MAX_ALLOW_CUT};
use particle_grid::protocol::{encode_restart, encode_simple};
use particle_grid::{GridFrame, GridSink, SimConfig, Simulation, TouchSample};

const UDP_PORT: u16 = 3000;
/// How long a received display payload replaces the local grid.
const REMOTE_HOLD: Duration = Duration::from_secs(2);
const MAX_DATAGRAM: usize = 1024;

const PARAM_BOUNDARY_SHAPE: u8 = 71;
const PARAM_GRID_MODE: u8 = 140;
const PARAM_THEME: u8 = 146;

/// Snapshot of the last local frame, copied out of the simulation for drawing.
struct FrameBuffer {
    header: Option<DisplayHeader>,
    values: Vec<u8>,
}

impl GridSink for FrameBuffer {
    fn present(&mut self, frame: &GridFrame<'_>) {
        self.values.clear();
        self.values.extend_from_slice(frame.values);
        self.header = Some(DisplayHeader::for_grid(
            frame.cols,
            frame.rows,
            frame.values.len() as u16,
            frame.gap,
            frame.theme,
            frame.brightness,
            MAX_ALLOW_CUT,
        ));
    }
}

struct RemoteFrame {
    bytes: Vec<u8>,
    received: Instant,
}

struct Touch {
    point: Point,
    pressed: bool,
}

impl Touch {
    fn sample(&self) -> TouchSample {
        TouchSample {
            x: self.point.x.clamp(0, SCREEN_WIDTH as i32 - 1) as u16,
            y: self.point.y.clamp(0, SCREEN_HEIGHT as i32 - 1) as u16,
            pressed: self.pressed,
        }
    }
}

fn draw_cells(
    display: &mut SimulatorDisplay<Rgb888>,
    header: &DisplayHeader,
    values: &[u8],
    shape: BoundaryShape,
) -> Result<(), Infallible> {
    for cell in payload::layout(header, values, shape) {
        let [r, g, b] = palette::color(header.theme, cell.value);
        Rectangle::new(Point::new(cell.x, cell.y), Size::new(cell.w, cell.h))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::new(r, g, b)))
            .draw(display)?;
    }
    Ok(())
}

fn render(
    display: &mut SimulatorDisplay<Rgb888>,
    sim: &Simulation,
    local: &FrameBuffer,
    remote: Option<&RemoteFrame>,
) -> Result<(), Infallible> {
    display.clear(Rgb888::BLACK)?;

    let mut source = "local";
    let remote = remote.and_then(|frame| payload::decode(&frame.bytes).ok());
    match (&remote, &local.header) {
        (Some(frame), _) => {
            // Device panel is round, so remote payloads are cut against the circle
            draw_cells(display, &frame.header, frame.values, BoundaryShape::Circular)?;
            source = "udp";
        }
        (None, Some(header)) => {
            draw_cells(display, header, &local.values, BoundaryShape::Rectangular)?;
        }
        (None, None) => {}
    }

    let cfg = sim.config();
    if cfg.boundary_shape == BoundaryShape::Circular {
        let diameter = SCREEN_WIDTH.min(SCREEN_HEIGHT) as u32;
        Circle::new(Point::zero(), diameter)
            .into_styled(PrimitiveStyle::with_stroke(Rgb888::new(60, 60, 60), 1))
            .draw(display)?;
    }

    let style = MonoTextStyle::new(&FONT_6X10, Rgb888::new(200, 200, 200));
    let stats = sim.stats();
    let status = format!(
        "{} t{} {}fps {}",
        cfg.grid_mode.name(),
        cfg.theme,
        stats.last_sim_fps,
        source
    );
    Text::with_baseline(&status, Point::new(4, 4), style, Baseline::Top).draw(display)?;
    Ok(())
}

fn bind_socket() -> Option<UdpSocket> {
    let socket = match UdpSocket::bind(("0.0.0.0", UDP_PORT)) {
        Ok(socket) => socket,
        Err(err) => {
            log::warn!("udp: cannot bind port {}: {}, running without network", UDP_PORT, err);
            return None;
        }
    };
    if let Err(err) = socket.set_nonblocking(true) {
        log::warn!("udp: cannot set non-blocking: {}, running without network", err);
        return None;
    }
    log::info!("udp: listening on port {}", UDP_PORT);
    Some(socket)
}

/// Drain every pending datagram without blocking.
fn poll_socket(socket: &UdpSocket, sim: &mut Simulation, remote: &mut Option<RemoteFrame>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let len = match socket.recv_from(&mut buf) {
            Ok((len, _)) => len,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return,
            Err(err) => {
                log::warn!("udp: receive failed: {}", err);
                return;
            }
        };
        let datagram = &buf[..len];
        if len >= payload::HEADER_LEN {
            match payload::decode(datagram) {
                Ok(frame) => {
                    log::debug!("udp: payload with {} cells", frame.values.len());
                    *remote = Some(RemoteFrame { bytes: datagram.to_vec(), received: Instant::now() });
                }
                Err(err) => log::warn!("udp: dropped payload: {}", err),
            }
        } else {
            // Errors are logged by the protocol layer
            let _ = sim.handle_datagram(datagram);
        }
    }
}

fn handle_key(key: &str, sim: &mut Simulation) -> bool {
    let cfg = *sim.config();
    let datagram = match key {
        "m" => encode_simple(PARAM_GRID_MODE, cfg.grid_mode.next().index()),
        "t" => encode_simple(PARAM_THEME, (cfg.theme + 1) % palette::THEME_COUNT),
        "b" => {
            let shape = match cfg.boundary_shape {
                BoundaryShape::Circular => 1,
                BoundaryShape::Rectangular => 0,
            };
            encode_simple(PARAM_BOUNDARY_SHAPE, shape)
        }
        "r" => encode_restart(),
        "q" => return false,
        _ => return true,
    };
    // Keys go through the same path as remote control
    match sim.handle_datagram(&datagram) {
        Ok(command) => log::info!("key {}: {:?}", key, command),
        Err(err) => log::warn!("key {}: {}", key, err),
    }
    true
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut display: SimulatorDisplay<Rgb888> =
        SimulatorDisplay::new(Size::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32));
    let output_settings = OutputSettingsBuilder::new().scale(3).build();
    let mut window = Window::new("Particle Grid", &output_settings);

    let mut sim = Simulation::new(SimConfig::default());
    let mut local = FrameBuffer { header: None, values: Vec::new() };
    let mut remote: Option<RemoteFrame> = None;
    let mut touch = Touch { point: Point::zero(), pressed: false };
    let socket = bind_socket();

    log::info!("controls: M mode | T theme | B boundary | R restart | Q quit | mouse = touch");

    let start = Instant::now();
    let idle = Duration::from_millis(1);

    'main_loop: loop {
        if let Some(socket) = &socket {
            poll_socket(socket, &mut sim, &mut remote);
        }
        if remote.as_ref().is_some_and(|frame| frame.received.elapsed() > REMOTE_HOLD) {
            remote = None;
        }

        let now_us = start.elapsed().as_micros() as u64;
        let tick = sim.run_iteration(now_us, Some(touch.sample()), None, &mut local);

        if tick.render {
            render(&mut display, &sim, &local, remote.as_ref())?;
            window.update(&display);

            for event in window.events() {
                match event {
                    SimulatorEvent::Quit => break 'main_loop,
                    SimulatorEvent::KeyDown { keycode, .. } => {
                        let key = format!("{:?}", keycode).to_lowercase();
                        if !handle_key(&key, &mut sim) {
                            break 'main_loop;
                        }
                    }
                    SimulatorEvent::MouseButtonDown { point, .. } => {
                        touch = Touch { point, pressed: true };
                    }
                    SimulatorEvent::MouseButtonUp { point, .. } => {
                        touch = Touch { point, pressed: false };
                    }
                    SimulatorEvent::MouseMove { point } => touch.point = point,
                    _ => {}
                }
            }
        }

        thread::sleep(idle);
    }

    log::info!("bye");
    Ok(())
}
