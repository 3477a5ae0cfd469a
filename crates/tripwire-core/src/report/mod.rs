mod format;
mod renderer;

pub use format::{
    format_logs_for_analysis, format_logs_for_display, format_metrics, time_range,
    ANALYSIS_LOG_LIMIT, DISPLAY_LOG_LIMIT,
};
pub use renderer::{render_ticket, ticket_body, ticket_labels, ticket_title, TicketContext};
