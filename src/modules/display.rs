//! Display rotator: three screens over the cached snapshot, preempted by
//! transient notices.
//!
//! Rendering is decoupled from screen advancement: the display re-renders
//! twice a second so fresh snapshot values appear quickly, while the
//! visible screen only changes on a slower wall-clock gate, independent of
//! whether new sensor data arrived.

use core::fmt::{self, Write};

use embassy_time::{Duration, Instant};
use heapless::String;

use crate::peripherals::{DISPLAY_WIDTH, DisplayOutput};
use crate::runtime::{NodeModule, PublishOutbox, TopicCollector};
use crate::session::InboundMessage;
use crate::state::{NodeState, SensorSnapshot};

/// Re-render cadence.
pub const DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// How long each screen stays up before the rotation advances.
pub const SCREEN_HOLD: Duration = Duration::from_millis(3000);

const SCREEN_COUNT: u8 = 3;

/// One rendered display line, clipped to the panel width.
type Line = String<DISPLAY_WIDTH>;

/// Cycles the 2-line display through voltage/relay/current,
/// power/energy, and frequency/power-factor/climate screens.
pub struct DisplayModule<D: DisplayOutput> {
    display: D,
    screen: u8,
    last_advance: Option<Instant>,
}

impl<D: DisplayOutput> DisplayModule<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            screen: 0,
            last_advance: None,
        }
    }

    fn render(&mut self, snapshot: &SensorSnapshot) {
        let (top, bottom) = match self.screen {
            0 => (
                line(format_args!(
                    "V:{:.1}V  R:{}",
                    snapshot.voltage,
                    if snapshot.relay_on { "ON" } else { "OF" }
                )),
                line(format_args!("I:{:.3}A", snapshot.current)),
            ),
            1 => (
                line(format_args!("P:{:.1}W", snapshot.power)),
                line(format_args!("E:{:.3}kWh", snapshot.energy)),
            ),
            _ => (
                line(format_args!(
                    "F:{:.1}Hz PF:{:.2}",
                    snapshot.frequency, snapshot.power_factor
                )),
                line(format_args!(
                    "T:{:.1}C H:{:.0}%",
                    snapshot.temperature, snapshot.humidity
                )),
            ),
        };
        self.display.show(&top, &bottom);
    }
}

/// Renders one line, silently clipping at the panel width.
fn line(args: fmt::Arguments<'_>) -> Line {
    let mut out = Line::new();
    let _ = out.write_fmt(args);
    out
}

impl<D: DisplayOutput> NodeModule for DisplayModule<D> {
    fn register(&self, _collector: &mut dyn TopicCollector) {}

    fn on_message(&mut self, _msg: &InboundMessage<'_>, _state: &mut NodeState, _now: Instant) {}

    fn on_tick(
        &mut self,
        state: &mut NodeState,
        _outbox: &mut dyn PublishOutbox,
        now: Instant,
    ) -> Duration {
        state.notice_dirty = false;

        if let Some(notice) = state.notice {
            self.display.show(notice.top, notice.bottom);
            return DISPLAY_REFRESH_INTERVAL;
        }

        match self.last_advance {
            None => self.last_advance = Some(now),
            Some(t) if now - t >= SCREEN_HOLD => {
                self.screen = (self.screen + 1) % SCREEN_COUNT;
                self.last_advance = Some(now);
            }
            _ => {}
        }

        self.render(&state.snapshot);
        DISPLAY_REFRESH_INTERVAL
    }

    fn needs_immediate_tick(&self, state: &NodeState) -> bool {
        state.notice_dirty
    }
}
