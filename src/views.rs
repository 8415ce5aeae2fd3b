//! Minimal server-rendered pages. Presentation is not this service's job;
//! these documents exist so the auth flow and the live feed are usable from
//! a browser without any frontend build.

use axum::response::Html;

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n{body}\n</body></html>\n"
    ))
}

fn flash_block(flash: Option<&str>) -> String {
    match flash {
        Some(msg) => format!("<p class=\"flash\">{}</p>", escape(msg)),
        None => String::new(),
    }
}

pub fn login_page(flash: Option<&str>, next: Option<&str>) -> Html<String> {
    let action = match next {
        Some(n) => format!(
            "/login?next={}",
            percent_encoding::utf8_percent_encode(n, crate::auth::session::NEXT_ENCODE_SET)
        ),
        None => "/login".to_string(),
    };
    let body = format!(
        "<h1>Sign in</h1>\n{flash}\
         <form method=\"post\" action=\"{action}\">\n\
         <label>Username <input name=\"username\" required></label><br>\n\
         <label>Password <input name=\"password\" type=\"password\" required></label><br>\n\
         <button type=\"submit\">Log in</button>\n</form>\n\
         <p><a href=\"/register\">Create an account</a></p>",
        flash = flash_block(flash),
    );
    page("Sign in", &body)
}

pub fn register_page(flash: Option<&str>) -> Html<String> {
    let body = format!(
        "<h1>Create account</h1>\n{flash}\
         <form method=\"post\" action=\"/register\">\n\
         <label>Username <input name=\"username\" required></label><br>\n\
         <label>Email <input name=\"email\" type=\"email\" required></label><br>\n\
         <label>Password <input name=\"password\" type=\"password\" required></label><br>\n\
         <button type=\"submit\">Register</button>\n</form>\n\
         <p><a href=\"/login\">Back to login</a></p>",
        flash = flash_block(flash),
    );
    page("Create account", &body)
}

pub fn index_page(username: &str) -> Html<String> {
    let body = format!(
        "<h1>Home monitor</h1>\n\
         <p>Signed in as {user} — <a href=\"/logout\">log out</a></p>\n\
         <img src=\"/video_feed\" alt=\"live camera\" width=\"800\" height=\"600\">\n\
         <ul>\n\
         <li><a href=\"/temperature_data\">Last 24h of readings (JSON)</a></li>\n\
         <li><a href=\"/insert_test_data\">Regenerate test data</a></li>\n\
         </ul>",
        user = escape(username),
    );
    page("Home monitor", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_usernames() {
        let Html(html) = index_page("<script>alert(1)</script>");
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn login_form_posts_back_to_the_guarded_next_path() {
        let Html(html) = login_page(None, Some("/video_feed"));
        assert!(html.contains("action=\"/login?next=/video_feed\""));
    }
}
