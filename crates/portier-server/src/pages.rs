//! HTML screens for the approval flow.
//!
//! Every interpolated value is escaped for its context: text, double-quoted
//! attribute, or JavaScript string literal inside a `<script>` block.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::provider::AuthRequest;

/// Delay before the status pages follow their redirect.
pub const REDIRECT_DELAY_MS: u64 = 2000;

const PERMISSIONS: &[&str] = &[
    "Verify your identity",
    "Know which resources you can access",
    "Act on your behalf",
];

/// Wrap page content in the shared document shell.
pub fn layout(content: &str, company_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{title} - Authorization</title>
    <script src="https://cdn.tailwindcss.com"></script>
  </head>
  <body class="bg-gray-50 text-gray-800 font-sans leading-relaxed flex flex-col min-h-screen">
    <main class="container mx-auto px-4 py-10 flex-grow flex items-center justify-center">{content}</main>
  </body>
</html>
"#,
        title = encode_text(company_name),
        content = content,
    )
}

/// Approval screen for a signed-in user.
///
/// Embeds the serialized request and the current authorize URL as hidden
/// fields so `/approve` can pick the transaction back up.
pub fn authorize_screen(
    request_json: &str,
    authorize_url: &str,
    logo_url: &str,
    company_name: &str,
) -> String {
    let permissions: String = PERMISSIONS
        .iter()
        .map(|p| format!(r#"<li class="text-gray-600">{}</li>"#, p))
        .collect::<Vec<_>>()
        .join("\n          ");

    format!(
        r#"<div class="w-full max-w-md mx-auto">
  <div class="flex flex-col items-center text-center mb-6">
    <img src="{logo}" alt="{company_attr}" class="h-12 w-12 rounded-md mb-3" />
    <div class="text-2xl font-bold text-gray-900">{company}</div>
  </div>
  <div class="bg-white p-8 rounded-xl shadow-sm border border-gray-100">
    <h1 class="text-xl font-semibold mb-4 text-gray-900">Authorization Request</h1>
    <div class="mb-6">
      <h2 class="text-lg font-semibold mb-3 text-gray-800">{company} would like permission to:</h2>
      <ul class="space-y-4">
          {permissions}
      </ul>
    </div>
    <form action="/approve" method="POST" class="space-y-3">
      <input type="hidden" name="oauthReqInfo" value="{request}" />
      <input type="hidden" name="authorizeUrl" value="{authorize_url}" />
      <button type="submit" name="action" value="approve"
        class="w-full py-3 px-4 bg-black text-white rounded-md font-medium">Approve</button>
      <button type="submit" name="action" value="reject"
        class="w-full py-3 px-4 border border-gray-300 text-gray-700 rounded-md font-medium">Reject</button>
    </form>
  </div>
</div>"#,
        logo = encode_double_quoted_attribute(logo_url),
        company_attr = encode_double_quoted_attribute(company_name),
        company = encode_text(company_name),
        permissions = permissions,
        request = encode_double_quoted_attribute(request_json),
        authorize_url = encode_double_quoted_attribute(authorize_url),
    )
}

/// Convenience wrapper serializing `request` for [`authorize_screen`].
pub fn authorize_screen_for(
    request: &AuthRequest,
    authorize_url: &str,
    logo_url: &str,
    company_name: &str,
) -> serde_json::Result<String> {
    Ok(authorize_screen(
        &request.to_form_value()?,
        authorize_url,
        logo_url,
        company_name,
    ))
}

fn status_content(message: &str, success: bool, redirect_url: &str) -> String {
    let (badge_class, badge) = if success {
        ("bg-green-100 text-green-800", "&#10003;")
    } else {
        ("bg-red-100 text-red-800", "&#10007;")
    };

    format!(
        r#"<div class="max-w-md mx-auto bg-white p-8 rounded-lg shadow-md text-center">
  <div class="mb-4">
    <span class="inline-flex h-10 w-10 items-center justify-center {badge_class} rounded-full">{badge}</span>
  </div>
  <h1 class="text-2xl font-bold mb-4 text-gray-900">{message}</h1>
  <p class="mb-8 text-gray-600">You will be redirected back to the application shortly.</p>
  <a href="/" class="inline-block py-2 px-4 bg-black text-white rounded-md font-medium">Return to Home</a>
  <script>
    setTimeout(() => {{
      window.location.href = {target};
    }}, {delay});
  </script>
</div>"#,
        badge_class = badge_class,
        badge = badge,
        message = encode_text(message),
        target = script_string(redirect_url),
        delay = REDIRECT_DELAY_MS,
    )
}

/// Status page redirecting to the client after a successful approval.
pub fn approved_content(redirect_url: &str) -> String {
    status_content("Authorization approved!", true, redirect_url)
}

/// Status page redirecting away after a rejection the user did not choose.
pub fn rejected_content(redirect_url: &str) -> String {
    status_content("Authorization rejected.", false, redirect_url)
}

/// Dead-end page after an explicit rejection, linking back to the authorize
/// URL the user came from.
pub fn rejected_page(authorize_url: &str, company_name: &str) -> String {
    format!(
        r#"<div class="max-w-md mx-auto bg-white p-8 rounded-lg shadow-md text-center">
  <div class="mb-4">
    <span class="inline-flex h-10 w-10 items-center justify-center bg-red-100 text-red-800 rounded-full">&#10007;</span>
  </div>
  <h1 class="text-2xl font-bold mb-4 text-gray-900">Authorization required</h1>
  <p class="mb-8 text-gray-600">If you don't accept permissions, you won't be able to use {company}.</p>
  <a href="{href}" class="inline-block py-2 px-4 bg-black text-white rounded-md font-medium">Go back to authorize</a>
</div>"#,
        company = encode_text(company_name),
        href = encode_double_quoted_attribute(authorize_url),
    )
}

/// Render `value` as a JavaScript string literal safe inside `<script>`.
fn script_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace("</", "<\\/")
}
