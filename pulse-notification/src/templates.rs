use chrono::NaiveDate;

pub struct SpikeEmail {
    pub subject: String,
    pub html: String,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `page_views` -> `page views`
fn metric_label(metric_name: &str) -> String {
    metric_name.replace('_', " ")
}

pub fn spike_email(metric_name: &str, percent: i64, date: NaiveDate, dashboard_url: &str) -> SpikeEmail {
    let metric = escape(&metric_label(metric_name));
    let day = date.format("%B %-d, %Y");
    let sign = if percent >= 0 { "+" } else { "" };

    let subject = format!("Pulse - Traffic spike: {metric} {sign}{percent}%");
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
        <h2 style="color: #2563eb;">Pulse - Traffic spike detected</h2>
        <p>Your <strong>{metric}</strong> on {day} were up compared to the previous period:</p>
        <div style="background: #0f172a; color: #38bdf8; font-size: 32px; font-weight: bold; text-align: center; padding: 20px; border-radius: 8px;">{sign}{percent}%</div>
        <p style="margin-top: 20px;"><a href="{url}" style="color: #2563eb;">Open your dashboard</a></p>
        <p style="color: #666;">You can turn these alerts off in your notification settings.</p>
        </div>"#,
        url = escape(dashboard_url),
    );

    SpikeEmail { subject, html }
}
