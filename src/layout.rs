use ratatui::prelude::*;

const TITLE_HEIGHT: u16 = 1;
const FORM_HEIGHT: u16 = 10;

const VERTICAL_CONSTRAINTS: [Constraint; 3] = [
    Constraint::Length(TITLE_HEIGHT),
    Constraint::Length(FORM_HEIGHT),
    Constraint::Min(5),
];

pub struct AppLayoutRects {
    pub title: Rect,
    pub form: Rect,
    pub results: Rect,
}

pub fn get_app_layout(area: Rect) -> AppLayoutRects {
    let layout = Layout::vertical(VERTICAL_CONSTRAINTS).split(area);
    AppLayoutRects {
        title: layout[0],
        form: layout[1],
        results: layout[2],
    }
}

/// Centered popup rect for the password prompt.
pub fn get_popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(
        area.x + (area.width.saturating_sub(w)) / 2,
        area.y + (area.height.saturating_sub(h)) / 2,
        w,
        h,
    )
}
