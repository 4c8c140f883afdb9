//! SENTRIX TUI Dashboard Module
//! ============================
//!
//! Terminal render collaborator for the attack globe. Consumes
//! [`FramePacket`]s over a Crossbeam channel and sends operator input back
//! as [`Interaction`]s.
//!
//! Enable with the `dashboard` feature flag.
//!
//! Features:
//! - Flat world map with every live arc and its packet
//! - Active event table (newest on top) with a movable cursor
//! - Selected event panel
//! - Feed counters
//!
//! Keys: `↑/↓` move, `Enter` select, `c` clear, `t` test alert,
//! `a` toggle auto-select, `q` quit.

use std::io;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crossbeam::channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        canvas::{self, Canvas, Map, MapResolution, Points},
        Block, Borders, Paragraph, Row, Table,
    },
    Frame, Terminal,
};

use crate::arc_path::ArcPath;
use crate::attack::ThreatLevel;
use crate::config::GlobeConfig;
use crate::projection::unproject;
use crate::runtime::{FramePacket, Interaction};
use crate::scene::ArcFrame;

/// Waits up to one UI tick for a key press.
fn poll_key() -> io::Result<Option<KeyCode>> {
    if event::poll(Duration::from_millis(33))? {
        if let Event::Key(key) = event::read()? {
            return Ok(Some(key.code));
        }
    }
    Ok(None)
}

/// Polyline resolution used for map tracks.
const MAP_SEGMENTS: usize = 32;

/// Projects an arc onto the flat map as `(lon, lat)` line segments.
///
/// Segments that would wrap across the antimeridian are dropped.
pub fn map_track(arc: &ArcFrame, globe: &GlobeConfig) -> Vec<((f64, f64), (f64, f64))> {
    let path = ArcPath::between(
        arc.source_coord,
        arc.target_coord,
        globe.radius,
        &globe.path_params(),
    );

    let points: Vec<(f64, f64)> = path
        .sample(MAP_SEGMENTS)
        .iter()
        .map(|p| {
            let c = unproject(p);
            (c.lon, c.lat)
        })
        .collect();

    points
        .windows(2)
        .filter(|w| (w[0].0 - w[1].0).abs() <= 180.0)
        .map(|w| (w[0], w[1]))
        .collect()
}

fn level_color(level: ThreatLevel) -> Color {
    match level {
        ThreatLevel::Low => Color::Yellow,
        ThreatLevel::Medium => Color::LightRed,
        ThreatLevel::High => Color::Red,
        ThreatLevel::Critical => Color::Magenta,
    }
}

// =============================================================================
// THREAT DASHBOARD
// =============================================================================

pub struct ThreatDashboard {
    rx: Receiver<FramePacket>,
    interactions: Sender<Interaction>,
    globe: GlobeConfig,
    latest: Option<FramePacket>,
    /// Row index into the newest-first event table
    cursor: usize,
    frame_count: usize,
}

impl ThreatDashboard {
    pub fn new(
        rx: Receiver<FramePacket>,
        interactions: Sender<Interaction>,
        globe: GlobeConfig,
    ) -> Self {
        Self {
            rx,
            interactions,
            globe,
            latest: None,
            cursor: 0,
            frame_count: 0,
        }
    }

    /// Keeps only the newest packet.
    fn drain(&mut self) {
        while let Ok(packet) = self.rx.try_recv() {
            self.latest = Some(packet);
        }
        let len = self.latest.as_ref().map_or(0, |p| p.events.len());
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    /// Maps a key to an interaction. Returns `false` when the user quits.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let len = self.latest.as_ref().map_or(0, |p| p.events.len());
        let interaction = match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.cursor + 1 < len {
                    self.cursor += 1;
                }
                None
            }
            KeyCode::Enter => self
                .latest
                .as_ref()
                .and_then(|p| p.events.iter().rev().nth(self.cursor))
                .map(|e| Interaction::Select(e.id.clone())),
            KeyCode::Char('c') => Some(Interaction::ClearSelection),
            KeyCode::Char('t') => Some(Interaction::InjectTestAlert),
            KeyCode::Char('a') => {
                let enabled = self.latest.as_ref().map_or(true, |p| p.auto_select);
                Some(Interaction::SetAutoSelect(!enabled))
            }
            _ => None,
        };

        if let Some(interaction) = interaction {
            // Runtime already gone: nothing left to steer
            let _ = self.interactions.send(interaction);
        }
        true
    }

    /// Run the TUI main loop (blocks until 'q' pressed)
    ///
    /// The terminal is restored on every exit path, errors included.
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }

        let result = match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(mut terminal) => {
                let result = self.event_loop(&mut terminal, poll_key);
                let _ = terminal.show_cursor();
                result
            }
            Err(e) => Err(e),
        };

        let restored = disable_raw_mode().and_then(|_| execute!(io::stdout(), LeaveAlternateScreen));
        result.and(restored)
    }

    /// Draws until `next_key` yields a quit key or fails.
    fn event_loop<B, K>(&mut self, terminal: &mut Terminal<B>, mut next_key: K) -> io::Result<()>
    where
        B: Backend,
        K: FnMut() -> io::Result<Option<KeyCode>>,
    {
        loop {
            self.drain();

            terminal.draw(|f| self.ui(f))?;
            self.frame_count += 1;

            if let Some(code) = next_key()? {
                if !self.handle_key(code) {
                    return Ok(());
                }
            }
        }
    }

    fn ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(12),   // Map + side panel
                Constraint::Length(9), // Event table
                Constraint::Length(1), // Footer
            ])
            .split(f.area());

        let Some(packet) = self.latest.as_ref() else {
            let waiting = Paragraph::new("Waiting for first frame...")
                .block(Block::default().title("SENTRIX").borders(Borders::ALL));
            f.render_widget(waiting, chunks[1]);
            return;
        };

        // === HEADER ===
        let stats = &packet.stats;
        let header = Paragraph::new(Line::from(vec![
            Span::styled("SENTRIX Live Attack Map", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  |  "),
            Span::styled(format!("t={:.1}s", packet.time_secs), Style::default().fg(Color::Cyan)),
            Span::raw("  |  "),
            Span::raw(format!(
                "accepted {}  dup {}  evicted {}  injected {}",
                stats.accepted, stats.duplicates, stats.evicted, stats.injected
            )),
            Span::raw("  |  "),
            Span::styled(
                if packet.auto_select { "auto-select ON" } else { "auto-select OFF" },
                Style::default().fg(if packet.auto_select { Color::Green } else { Color::DarkGray }),
            ),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));
        f.render_widget(header, chunks[0]);

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(chunks[1]);

        // === MAP ===
        let tracks: Vec<(Color, Vec<((f64, f64), (f64, f64))>)> = packet
            .arcs
            .iter()
            .map(|arc| {
                let color = if arc.dimmed {
                    Color::DarkGray
                } else {
                    Color::from_u32(arc.color)
                };
                (color, map_track(arc, &self.globe))
            })
            .collect();
        let packets: Vec<(Color, (f64, f64))> = packet
            .arcs
            .iter()
            .filter(|arc| arc.packet_opacity > 0.05)
            .map(|arc| {
                let c = unproject(&nalgebra::Vector3::from(arc.position));
                (level_color(arc.threat_level), (c.lon, c.lat))
            })
            .collect();

        let map = Canvas::default()
            .block(Block::default().title(format!("Live arcs ({})", packet.arcs.len())).borders(Borders::ALL))
            .x_bounds([-180.0, 180.0])
            .y_bounds([-90.0, 90.0])
            .paint(|ctx| {
                ctx.draw(&Map {
                    color: Color::DarkGray,
                    resolution: MapResolution::High,
                });
                ctx.layer();
                for (color, segments) in &tracks {
                    for ((x1, y1), (x2, y2)) in segments {
                        ctx.draw(&canvas::Line {
                            x1: *x1,
                            y1: *y1,
                            x2: *x2,
                            y2: *y2,
                            color: *color,
                        });
                    }
                }
                for (color, point) in &packets {
                    ctx.draw(&Points {
                        coords: &[*point],
                        color: *color,
                    });
                }
            });
        f.render_widget(map, middle[0]);

        // === SELECTED EVENT ===
        let detail: Vec<Line> = match &packet.selected {
            Some(s) => vec![
                Line::from(Span::styled(s.id.to_string(), Style::default().add_modifier(Modifier::BOLD))),
                Line::from(format!("type:   {}", s.attack_type)),
                Line::from(Span::styled(
                    format!("level:  {}", s.threat_level),
                    Style::default().fg(level_color(s.threat_level)),
                )),
                Line::from(format!("conf:   {}%", s.confidence)),
                Line::from(format!("source: {}", s.source)),
                Line::from(format!("target: {}", s.target)),
                Line::from(format!("status: {}", s.status)),
                Line::from(match s.phase {
                    Some(phase) => format!("arc:    {:?}", phase),
                    None => "arc:    finished".to_string(),
                }),
            ],
            None => vec![Line::from("No event selected")],
        };
        let detail = Paragraph::new(detail)
            .block(Block::default().title("Selected").borders(Borders::ALL));
        f.render_widget(detail, middle[1]);

        // === EVENT TABLE ===
        let header_cells = ["ID", "Type", "Level", "Conf", "Source"]
            .iter()
            .map(|h| Span::styled(*h, Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells).height(1);

        let selected_id = packet.selected.as_ref().map(|s| &s.id);
        let rows: Vec<Row> = packet
            .events
            .iter()
            .rev()
            .enumerate()
            .map(|(i, e)| {
                let mut style = Style::default();
                if i == self.cursor {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                if Some(&e.id) == selected_id {
                    style = style.add_modifier(Modifier::BOLD);
                }
                Row::new(vec![
                    Span::raw(e.id.to_string()),
                    Span::raw(e.attack_type.to_string()),
                    Span::styled(e.threat_level.to_string(), Style::default().fg(level_color(e.threat_level))),
                    Span::raw(format!("{}%", e.confidence)),
                    Span::raw(e.source.clone()),
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(26),
                Constraint::Length(17),
                Constraint::Length(9),
                Constraint::Length(5),
                Constraint::Min(10),
            ],
        )
        .header(header)
        .block(Block::default().title(format!("Active events ({})", packet.events.len())).borders(Borders::ALL));
        f.render_widget(table, chunks[2]);

        // === FOOTER ===
        let footer = Paragraph::new("↑/↓ move  Enter select  c clear  t test alert  a auto-select  q quit")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(footer, chunks[3]);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc_animator::ArcPhase;
    use crate::attack::{AttackStatus, AttackType, EventId, GeoCoord};
    use crate::feed_controller::FeedStats;
    use crate::scene::EventSummary;
    use ratatui::backend::TestBackend;
    use std::sync::mpsc;

    fn arc(source: GeoCoord, target: GeoCoord) -> ArcFrame {
        ArcFrame {
            id: EventId::from("LIVE-1-0001"),
            source_coord: source,
            target_coord: target,
            position: [0.0, 2.0, 0.0],
            opacity: 0.55,
            packet_opacity: 1.0,
            threat_level: ThreatLevel::High,
            color: ThreatLevel::High.color_key(),
            phase: ArcPhase::Traveling,
            travel_progress: 0.0,
            dimmed: false,
        }
    }

    fn summary(n: u64) -> EventSummary {
        EventSummary {
            id: EventId::live(1, n),
            source: "1.2.3.4".to_string(),
            target: "SENTRIX SYSTEM".to_string(),
            attack_type: AttackType::DDoS,
            threat_level: ThreatLevel::Low,
            status: AttackStatus::Active,
            confidence: 10,
            timestamp: n.to_string(),
            created_at_ms: 1,
            severe: false,
            phase: Some(ArcPhase::Traveling),
        }
    }

    fn packet(events: Vec<EventSummary>) -> FramePacket {
        FramePacket {
            time_secs: 0.0,
            arcs: Vec::new(),
            events,
            selected: None,
            stats: FeedStats::default(),
            auto_select: true,
        }
    }

    #[test]
    fn test_map_track_endpoints() {
        let globe = GlobeConfig::default();
        let track = map_track(
            &arc(GeoCoord::new(40.0, -74.0), GeoCoord::new(51.5, -0.1)),
            &globe,
        );

        assert_eq!(track.len(), MAP_SEGMENTS);
        let (first, _) = track[0];
        let (_, last) = track[track.len() - 1];
        assert!((first.0 + 74.0).abs() < 1e-6 && (first.1 - 40.0).abs() < 1e-6);
        assert!((last.0 + 0.1).abs() < 1e-6 && (last.1 - 51.5).abs() < 1e-6);
    }

    #[test]
    fn test_map_track_drops_antimeridian_wrap() {
        let globe = GlobeConfig::default();
        let track = map_track(
            &arc(GeoCoord::new(10.0, 170.0), GeoCoord::new(10.0, -170.0)),
            &globe,
        );
        assert!(track.len() < MAP_SEGMENTS);
        assert!(track.iter().all(|(a, b)| (a.0 - b.0).abs() <= 180.0));
    }

    #[test]
    fn test_keys_map_to_interactions() {
        let (_tx, rx) = crossbeam::channel::unbounded();
        let (itx, irx) = mpsc::channel();
        let mut dashboard = ThreatDashboard::new(rx, itx, GlobeConfig::default());
        dashboard.latest = Some(packet(vec![summary(1), summary(2), summary(3)]));

        // Newest first: cursor 0 is event 3
        assert!(dashboard.handle_key(KeyCode::Enter));
        assert_eq!(irx.try_recv().unwrap(), Interaction::Select(EventId::live(1, 3)));

        dashboard.handle_key(KeyCode::Down);
        dashboard.handle_key(KeyCode::Down);
        dashboard.handle_key(KeyCode::Down);
        dashboard.handle_key(KeyCode::Enter);
        assert_eq!(irx.try_recv().unwrap(), Interaction::Select(EventId::live(1, 1)));

        dashboard.handle_key(KeyCode::Char('a'));
        assert_eq!(irx.try_recv().unwrap(), Interaction::SetAutoSelect(false));
        dashboard.handle_key(KeyCode::Char('t'));
        assert_eq!(irx.try_recv().unwrap(), Interaction::InjectTestAlert);

        assert!(!dashboard.handle_key(KeyCode::Char('q')));
    }

    fn test_terminal() -> Terminal<TestBackend> {
        Terminal::new(TestBackend::new(100, 40)).unwrap()
    }

    #[test]
    fn test_event_loop_quits_on_q() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let (itx, _irx) = mpsc::channel();
        let mut dashboard = ThreatDashboard::new(rx, itx, GlobeConfig::default());
        tx.send(packet(vec![summary(1)])).unwrap();

        let mut keys = vec![Some(KeyCode::Char('q')), None, None].into_iter();
        let result = dashboard.event_loop(&mut test_terminal(), || Ok(keys.next_back().flatten()));

        assert!(result.is_ok());
        assert_eq!(dashboard.frame_count, 3);
    }

    #[test]
    fn test_event_loop_returns_input_errors() {
        let (_tx, rx) = crossbeam::channel::unbounded();
        let (itx, _irx) = mpsc::channel();
        let mut dashboard = ThreatDashboard::new(rx, itx, GlobeConfig::default());

        let mut calls = 0;
        let result = dashboard.event_loop(&mut test_terminal(), || {
            calls += 1;
            if calls == 2 {
                Err(io::Error::new(io::ErrorKind::Other, "tty gone"))
            } else {
                Ok(None)
            }
        });

        assert_eq!(result.unwrap_err().to_string(), "tty gone");
        assert_eq!(dashboard.frame_count, 2);
    }

    #[test]
    fn test_drain_keeps_latest_and_clamps_cursor() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let (itx, _irx) = mpsc::channel();
        let mut dashboard = ThreatDashboard::new(rx, itx, GlobeConfig::default());
        dashboard.cursor = 5;

        tx.send(packet(vec![summary(1), summary(2), summary(3)])).unwrap();
        tx.send(packet(vec![summary(4)])).unwrap();
        dashboard.drain();

        assert_eq!(dashboard.latest.as_ref().unwrap().events.len(), 1);
        assert_eq!(dashboard.cursor, 0);
    }
}
