// src/display/terminal.rs
//! Terminal dashboard for a run in progress

use crate::{
    error::{Result, TrackerError},
    tracking::state::{LiveStatus, TrackerStatus},
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    time::Duration,
};
use tokio::{sync::watch, time::sleep};

pub struct TerminalDisplay {
    source: String,
}

impl TerminalDisplay {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Redraw once per second until the run finishes or the controller goes away
    pub async fn run(&self, mut updates: watch::Receiver<LiveStatus>) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap).map_err(TrackerError::Io)?;

        loop {
            let state = updates.borrow_and_update().clone();

            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)).map_err(TrackerError::Io)?;
            self.render_display(&mut stdout, &state)?;
            stdout.flush().map_err(TrackerError::Io)?;

            if state.status == TrackerStatus::Finished {
                break;
            }

            // Wake on the next change, but at least once a second
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    sleep(Duration::from_millis(200)).await;
                }
                _ = sleep(Duration::from_secs(1)) => {}
            }
        }

        execute!(stdout, Show, EnableLineWrap).map_err(TrackerError::Io)?;
        Ok(())
    }

    /// Render the run state to the terminal
    fn render_display(&self, stdout: &mut impl Write, state: &LiveStatus) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Run Tracker"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )
        .map_err(TrackerError::Io)?;

        let status_color = match state.status {
            TrackerStatus::Running => Color::Green,
            TrackerStatus::Paused => Color::Yellow,
            TrackerStatus::Finished => Color::Cyan,
            TrackerStatus::Idle => Color::Grey,
        };
        let status_label = if state.is_auto_paused {
            format!("{} (auto)", state.status)
        } else {
            state.status.to_string()
        };
        execute!(
            stdout,
            Print("Status: "),
            SetForegroundColor(status_color),
            Print(status_label),
            ResetColor,
            Print(format!("   Source: {}\n\n", self.source))
        )
        .map_err(TrackerError::Io)?;

        self.render_progress_section(stdout, state)?;
        self.render_position_section(stdout, state)?;

        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("p + Enter: pause   r + Enter: resume   f + Enter: finish"),
            Print("\n"),
            ResetColor
        )
        .map_err(TrackerError::Io)?;

        Ok(())
    }

    fn render_progress_section(&self, stdout: &mut impl Write, state: &LiveStatus) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("PROGRESS:\n"),
            ResetColor,
            Print(format!("  Time:       {:>12}\n", state.format_elapsed())),
            Print(format!("  Distance:   {:>12.2} km\n", state.distance_km)),
            Print(format!("  Pace:       {:>12} /km\n", state.pace_label)),
            Print(format!("  Calories:   {:>12} kcal\n", state.calories)),
            Print(format!("  Heart rate: {:>12.0} bpm\n", state.heart_rate_bpm)),
            Print(format!("  Last km:    {:>12}\n\n", state.last_milestone_km))
        )
        .map_err(TrackerError::Io)?;

        Ok(())
    }

    fn render_position_section(&self, stdout: &mut impl Write, state: &LiveStatus) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("POSITION:\n"),
            ResetColor
        )
        .map_err(TrackerError::Io)?;

        match state.last_point {
            Some(point) => {
                let time = point
                    .time()
                    .map(|t| t.format("%H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "-".to_string());
                execute!(
                    stdout,
                    Print(format!("  Latitude:   {:>12.6}°\n", point.latitude)),
                    Print(format!("  Longitude:  {:>12.6}°\n", point.longitude)),
                    Print(format!("  Fix time:   {:>12}\n", time))
                )
                .map_err(TrackerError::Io)?;
            }
            None => {
                execute!(stdout, Print("  No fix\n")).map_err(TrackerError::Io)?;
            }
        }

        execute!(stdout, Print(format!("  Points:     {:>12}\n\n", state.points)))
            .map_err(TrackerError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::state::{TrackPoint, TrackerState};

    #[test]
    fn test_render_contains_progress() {
        let display = TerminalDisplay::new("simulated");
        let mut state = TrackerState::new();
        state.status = TrackerStatus::Paused;
        state.is_auto_paused = true;
        state.distance_km = 1.234;
        state.pace_label = "5:30".to_string();
        state.path.push(TrackPoint::new(52.5, 13.4, 0));

        let mut out = Vec::new();
        display
            .render_display(&mut out, &LiveStatus::from(&state))
            .unwrap();
        let text = String::from_utf8_lossy(&out);

        assert!(text.contains("Paused (auto)"));
        assert!(text.contains("1.23 km"));
        assert!(text.contains("5:30"));
        assert!(text.contains("52.500000"));
    }
}
