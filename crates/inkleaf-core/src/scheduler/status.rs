use crate::display::{Display, TextStyle};

const SIDE_MARGIN: u16 = 20;
const GAP: u16 = 30;
const ELLIPSIS: &str = "...";
const BATTERY_WIDTH: u16 = 15;
const BATTERY_HEIGHT: u16 = 10;

/// Counters shown in the bottom status line.
#[derive(Clone, Copy, Debug)]
pub(super) struct StatusLine<'a> {
    pub page_index: u16,
    pub page_count: u16,
    pub battery_percent: u8,
    pub title: &'a str,
}

/// Shortens `title` from the end until it fits `max_width`, marking the cut.
pub(super) fn fit_title(display: &dyn Display, title: &str, max_width: u16) -> String {
    if display.text_width(title, TextStyle::Small) <= max_width {
        return title.to_owned();
    }

    let mut kept: Vec<char> = title.chars().collect();
    while !kept.is_empty() {
        kept.pop();
        let mut candidate: String = kept.iter().collect();
        candidate.push_str(ELLIPSIS);
        if display.text_width(&candidate, TextStyle::Small) <= max_width {
            return candidate;
        }
    }
    String::new()
}

/// Outline with a terminal nub, filled in proportion to `percent` and never
/// wider than `max_width`. At least one column is always filled.
fn draw_battery_icon(display: &mut dyn Display, x: u16, y: u16, max_width: u16, percent: u8) {
    let height = BATTERY_HEIGHT.min(display.line_height(TextStyle::Small));
    let width = BATTERY_WIDTH.min(max_width);
    if height == 0 || width == 0 || y.saturating_add(height) > display.page_height() {
        return;
    }
    let nub = width / 7;
    let body = width - nub;
    display.draw_rect(x, y, body, height);
    if nub > 0 && height > 4 {
        display.fill_rect(x + body, y + 2, nub, height - 4, true);
    }

    let inner = body.saturating_sub(2);
    if inner == 0 || height <= 2 {
        return;
    }
    let filled = (u16::from(percent.min(100)) * inner / 100 + 1).min(inner);
    display.fill_rect(x + 1, y + 1, filled, height - 2, true);
}

/// Battery level on the left with its icon underneath, page counter on the
/// right, chapter title centered in whatever room is left between them.
pub(super) fn draw_status_line(display: &mut dyn Display, status: StatusLine<'_>) {
    let width = display.page_width();
    let side_margin = SIDE_MARGIN.min(width / 24);
    let gap = GAP.min(width / 16);
    let y = display
        .page_height()
        .saturating_sub(display.line_height(TextStyle::Small).saturating_mul(2));

    let progress = if status.page_count == 0 {
        String::from("0 / 0")
    } else {
        format!("{} / {}", u32::from(status.page_index) + 1, status.page_count)
    };
    let progress_width = display.text_width(&progress, TextStyle::Small);
    display.draw_text(
        width.saturating_sub(progress_width),
        y,
        &progress,
        TextStyle::Small,
    );

    let percent = status.battery_percent.min(100);
    let battery = format!("{percent}%");
    let battery_width = display.text_width(&battery, TextStyle::Small);
    display.draw_text(side_margin, y, &battery, TextStyle::Small);
    let icon_y = y.saturating_add(display.line_height(TextStyle::Small));
    draw_battery_icon(display, side_margin, icon_y, battery_width, percent);

    let left = side_margin + battery_width + gap;
    let right = progress_width + gap;
    let available = width.saturating_sub(left).saturating_sub(right);
    if available == 0 || status.title.is_empty() {
        return;
    }
    let title = fit_title(display, status.title, available);
    if title.is_empty() {
        return;
    }
    let title_width = display.text_width(&title, TextStyle::Small);
    display.draw_text(
        left + (available - title_width.min(available)) / 2,
        y,
        &title,
        TextStyle::Small,
    );
}
