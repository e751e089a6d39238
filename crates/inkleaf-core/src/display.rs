//! Display capability and the few screens the core draws itself.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextStyle {
    Regular,
    Bold,
    Small,
}

/// E-ink refresh kind. Full refreshes clear ghosting but flash the panel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefreshMode {
    Full,
    Partial,
}

/// Drawing surface of the panel.
///
/// Coordinates are in pixels (or cells) from the top-left corner. Nothing is
/// visible until [`Display::flush`] or [`Display::flush_area`].
pub trait Display {
    fn page_width(&self) -> u16;
    fn page_height(&self) -> u16;
    fn line_height(&self, style: TextStyle) -> u16;
    fn text_width(&self, text: &str, style: TextStyle) -> u16;

    fn clear_screen(&mut self);
    fn draw_text(&mut self, x: u16, y: u16, text: &str, style: TextStyle);
    fn draw_rect(&mut self, x: u16, y: u16, width: u16, height: u16);
    /// Paints the area with ink when `on`, with paper otherwise.
    fn fill_rect(&mut self, x: u16, y: u16, width: u16, height: u16, on: bool);

    fn flush(&mut self, mode: RefreshMode);
    fn flush_area(&mut self, x: u16, y: u16, width: u16, height: u16);
}

/// Substitute content shown instead of a cached page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Placeholder {
    EmptyChapter,
    OutOfBounds,
}

impl Placeholder {
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmptyChapter => "Empty chapter",
            Self::OutOfBounds => "Out of bounds",
        }
    }
}

const PLACEHOLDER_Y: u16 = 300;
const POPUP_MARGIN: u16 = 20;
const POPUP_Y: u16 = 50;
const INDEXING_LABEL: &str = "Indexing...";

fn centered_x(display: &dyn Display, text: &str, style: TextStyle) -> u16 {
    display
        .page_width()
        .saturating_sub(display.text_width(text, style))
        / 2
}

/// Draws `placeholder` horizontally centered, a little above mid-screen.
pub fn draw_placeholder(display: &mut dyn Display, placeholder: Placeholder) {
    let label = placeholder.label();
    let x = centered_x(display, label, TextStyle::Bold);
    let y = PLACEHOLDER_Y.min(display.page_height() / 2);
    display.draw_text(x, y, label, TextStyle::Bold);
}

/// Boxed "Indexing..." notice shown while a chapter cache is being built.
///
/// Only the popup area is pushed to the panel.
pub fn draw_indexing_popup(display: &mut dyn Display) {
    let line_height = display.line_height(TextStyle::Bold);
    let margin = POPUP_MARGIN.min(line_height);
    let text_width = display.text_width(INDEXING_LABEL, TextStyle::Bold);
    let width = text_width.saturating_add(margin * 2);
    let height = line_height.saturating_add(margin * 2);
    let x = display.page_width().saturating_sub(width) / 2;
    let y = POPUP_Y
        .min(display.page_height() / 8)
        .min(display.page_height().saturating_sub(height));

    display.fill_rect(x, y, width, height, false);
    let inset = margin / 10;
    display.draw_rect(
        x + inset,
        y + inset,
        width.saturating_sub(inset * 2),
        height.saturating_sub(inset * 2),
    );
    display.draw_text(x + margin, y + margin, INDEXING_LABEL, TextStyle::Bold);
    display.flush_area(x, y, width, height);
}
