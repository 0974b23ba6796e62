//! ==============================================================================
//! widget.rs - html widget renderer
//! ==============================================================================
//!
//! purpose:
//!     turns a snapshot into the small html widget the host serves.
//!     reads only; never touches the store.
//!
//! layout:
//!
//!     ┌──────────────────────────────┐
//!     │ Nature Remo                  │  <- title (small)
//!     │ Temperature: 21.5°C          │
//!     │ Humidity: 40%                │  rows follow the show_* toggles
//!     │ Illumination: Dim (100)      │
//!     │ Motion Detect: 3/1 10:02     │
//!     │ Updated at 2024-03-01 10:05  │  <- only with an auxiliary payload
//!     └──────────────────────────────┘
//!
//! relationships:
//!     - used by: host.rs (redraw loop)
//!     - uses: format.rs, selector.rs
//!
//! ==============================================================================

use crate::config::DisplayConfig;
use crate::domain::{DeviceRecord, SensorEvent, Snapshot};
use crate::format;
use crate::selector::{select_device, DeviceCriterion};

use chrono::{Local, TimeZone};
use std::fmt::Write;

/// shown when a sensor kind is missing from the device
const NO_READING: &str = "--";

/// anything that can draw a snapshot
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &Snapshot) -> String;
}

pub struct WidgetRenderer<Tz: TimeZone = Local> {
    display: DisplayConfig,
    criterion: DeviceCriterion,
    tz: Tz,
}

impl WidgetRenderer<Local> {
    pub fn new(display: DisplayConfig, criterion: DeviceCriterion) -> Self {
        Self { display, criterion, tz: Local }
    }
}

impl<Tz: TimeZone> WidgetRenderer<Tz> {
    /// render motion times in `tz` instead of the host's local zone
    #[allow(dead_code)]
    pub fn with_time_zone<T: TimeZone>(self, tz: T) -> WidgetRenderer<T> {
        WidgetRenderer { display: self.display, criterion: self.criterion, tz }
    }

    fn row(&self, out: &mut String, title: &str, value: &str) {
        let _ = write!(
            out,
            r#"<div><span style="font-size: 0.8em;">{}</span><span style="color: #fff;">{}</span></div>"#,
            html_escape(title),
            html_escape(value)
        );
    }

    fn device_rows(&self, out: &mut String, dev: &DeviceRecord) {
        let d = &self.display;
        let events = &dev.newest_events;
        if d.show_temperature {
            let v = reading(&events.te, |e| format::temperature_label(e.val, d.temperature_unit));
            self.row(out, &d.temperature_title, &v);
        }
        if d.show_humidity {
            let v = reading(&events.hu, |e| format::humidity_label(e.val));
            self.row(out, &d.humidity_title, &v);
        }
        if d.show_illumination {
            let v = reading(&events.il, |e| format::illumination_label(e.val));
            self.row(out, &d.illumination_title, &v);
        }
        if d.show_motion {
            let v = reading(&events.mo, |e| {
                format::motion_label(
                    e.created_at,
                    d.motion_date_offset_seconds,
                    d.motion_date_hour_format,
                    &self.tz,
                )
            });
            self.row(out, &d.motion_title, &v);
        }
    }
}

impl<Tz> Renderer for WidgetRenderer<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    fn render(&self, snapshot: &Snapshot) -> String {
        let d = &self.display;
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<div class="remo-widget" style="width: {}; height: {}; line-height: 1em;"><span style="font-size: 0.5em;">{}</span>"#,
            html_escape(&d.width),
            html_escape(&d.height),
            html_escape(&d.title)
        );

        if let Some(devices) = &snapshot.devices {
            match select_device(devices, &self.criterion) {
                Some(dev) => self.device_rows(&mut out, dev),
                None => {
                    // a missing device hides everything else, including the footer
                    out.push_str("<div>No devices are found</div></div>");
                    return out;
                }
            }
        }

        if let Some(aux) = &snapshot.auxiliary {
            let _ = write!(out, "<div>Updated at {}</div>", html_escape(&aux.date));
        }

        out.push_str("</div>");
        out
    }
}

fn reading(event: &Option<SensorEvent>, f: impl FnOnce(&SensorEvent) -> String) -> String {
    event.as_ref().map(f).unwrap_or_else(|| NO_READING.to_string())
}

/// escape html special characters to prevent xss
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
