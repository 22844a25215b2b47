//! Usage popup panel: indicator, meters, reset labels and recency.

use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use usagewatch_core::presentation::{DetailView, Indicator, Tier};
use usagewatch_core::state::StatusSnapshot;

/// Fixed label width for alignment (longest label "Session" = 7 chars)
const LABEL_WIDTH: usize = 7;

/// Usage popup panel
pub struct UsagePanel;

impl UsagePanel {
    /// Height needed to show everything: 2 border rows + 6 content rows
    pub const HEIGHT: u16 = 8;

    /// Render the panel
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        snapshot: &StatusSnapshot,
        notice: Option<&str>,
        color: bool,
    ) {
        if area.height < 3 || area.width < 20 {
            return;
        }

        let indicator = Indicator::from_snapshot(snapshot);
        let view = DetailView::from_snapshot(snapshot, Utc::now());

        let block = Block::default()
            .title(Self::build_title(&indicator))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Self::tier_color(indicator.tier, color)));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let mut lines = vec![Self::status_line(&view, color)];
        lines.push(Self::meter_line(
            "Session",
            view.session_percent,
            view.session_reset.as_deref(),
            inner.width,
            color,
        ));
        lines.push(Self::meter_line(
            "Weekly",
            view.weekly_percent,
            view.weekly_reset.as_deref(),
            inner.width,
            color,
        ));
        lines.push(Line::from(Span::styled(
            format!(
                " Updated {}",
                view.last_update.as_deref().unwrap_or("never")
            ),
            Style::default().fg(Color::DarkGray),
        )));

        if let Some(ref err) = view.last_error {
            lines.push(Line::from(Span::styled(
                format!(" Error: {}", err),
                Self::style(Color::Red, color),
            )));
        }

        let footer = notice.unwrap_or(" r: scrape now  q: quit");
        lines.push(Line::from(Span::styled(
            footer.to_string(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM),
        )));

        frame.render_widget(Paragraph::new(lines), inner);
    }

    /// Block title carrying the indicator: " Claude Usage 17% "
    fn build_title(indicator: &Indicator) -> String {
        if indicator.errored {
            format!(" Claude Usage {} ! ", indicator.text)
        } else {
            format!(" Claude Usage {} ", indicator.text)
        }
    }

    fn status_line(view: &DetailView, color: bool) -> Line<'static> {
        let status_color = match view.status_label {
            "Active" => Color::Green,
            "Error" => Color::Red,
            _ => Color::Yellow,
        };
        Line::from(vec![
            Span::styled(" Status  ", Style::default().add_modifier(Modifier::DIM)),
            Span::styled(
                view.status_label.to_string(),
                Self::style(status_color, color).add_modifier(Modifier::BOLD),
            ),
        ])
    }

    /// " Session ████████░░░░░  17% 3시간 50분 후"
    fn meter_line(
        label: &str,
        percent: Option<u8>,
        reset: Option<&str>,
        width: u16,
        color: bool,
    ) -> Line<'static> {
        let padded_label = format!("{:w$}", label, w = LABEL_WIDTH);
        let percent_str = format!("{:>4}", DetailView::percent_text(percent));
        let reset_str = reset.unwrap_or_default();

        // " Label   ████░░░░ 100% reset", Hangul labels take two cells per syllable
        let fixed_width = 1 + LABEL_WIDTH + 1 + 1 + 4 + 1 + reset_str.width();
        let bar_width = if width as usize > fixed_width + 4 {
            (width as usize - fixed_width).min(30)
        } else {
            4
        };

        let filled = percent
            .map(|p| bar_width * p.min(100) as usize / 100)
            .unwrap_or(0);
        let empty = bar_width.saturating_sub(filled);
        let tier = percent.map(Tier::for_percent).unwrap_or(Tier::Unknown);

        let dim = Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM);

        let mut spans = vec![
            Span::styled(
                format!(" {} ", padded_label),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::DIM),
            ),
            Span::styled(
                "█".repeat(filled),
                Style::default().fg(Self::tier_color(tier, color)),
            ),
            Span::styled("░".repeat(empty), dim),
            Span::styled(format!(" {}", percent_str), Style::default().fg(Color::White)),
        ];

        if !reset_str.is_empty() {
            spans.push(Span::styled(
                format!(" {}", reset_str),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::DIM),
            ));
        }

        Line::from(spans)
    }

    fn tier_color(tier: Tier, color: bool) -> Color {
        if !color {
            return Color::Gray;
        }
        match tier {
            Tier::Unknown => Color::Gray,
            Tier::Nominal => Color::Green,
            Tier::Warning => Color::Yellow,
            Tier::Critical => Color::Red,
        }
    }

    fn style(fg: Color, color: bool) -> Style {
        if color {
            Style::default().fg(fg)
        } else {
            Style::default()
        }
    }
}
