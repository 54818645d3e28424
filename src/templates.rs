//! Template engine setup and HTML templates.
//!
//! Templates are embedded in the binary.  Names end in `.html` so tera
//! autoescapes every interpolated value.

use once_cell::sync::Lazy;
use tera::{Context, Tera};

/// Global template engine instance with embedded templates.
pub static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", BASE_TEMPLATE),
        ("index.html", INDEX_TEMPLATE),
        ("customers.html", CUSTOMERS_TEMPLATE),
        ("customer_edit.html", CUSTOMER_EDIT_TEMPLATE),
        ("objects.html", OBJECTS_TEMPLATE),
        ("rename.html", RENAME_TEMPLATE),
        ("queue.html", QUEUE_TEMPLATE),
        ("error.html", ERROR_TEMPLATE),
    ])
    .expect("Failed to load templates");
    tera
});

/// Render a template with context.
pub fn render(template: &str, context: &Context) -> Result<String, tera::Error> {
    TEMPLATES.render(template, context)
}

/// Render the error page.
pub fn render_error(status: u16, message: &str, request_id: &str) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("status", &status);
    context.insert("message", message);
    context.insert("request_id", request_id);
    render("error.html", &context)
}

// =============================================================================
// Embedded templates
// =============================================================================

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{% block title %}ABC Retail Storage{% endblock %}</title>
    <style>
        :root {
            --bg: #f7f7f8;
            --card: #ffffff;
            --fg: #1d1d1f;
            --muted: #6e6e73;
            --border: #e2e2e5;
            --accent: #0b5cad;
            --danger: #b3261e;
        }
        * { box-sizing: border-box; }
        body {
            margin: 0;
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif;
            background: var(--bg);
            color: var(--fg);
            line-height: 1.5;
        }
        a { color: var(--accent); text-decoration: none; }
        a:hover { text-decoration: underline; }
        header { background: var(--card); border-bottom: 1px solid var(--border); }
        nav { max-width: 1000px; margin: 0 auto; padding: 14px 24px; display: flex; gap: 20px; }
        nav .brand { font-weight: 600; color: var(--fg); margin-right: auto; }
        main { max-width: 1000px; margin: 0 auto; padding: 24px; }
        .card { background: var(--card); border: 1px solid var(--border); border-radius: 8px; padding: 20px; margin-bottom: 20px; }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 8px; border-bottom: 1px solid var(--border); vertical-align: top; }
        th { color: var(--muted); font-weight: 500; font-size: 14px; }
        form.inline { display: inline; }
        input[type=text], input[type=email], select { padding: 6px 8px; border: 1px solid var(--border); border-radius: 6px; }
        button { padding: 6px 12px; border-radius: 6px; border: 1px solid var(--accent); background: var(--accent); color: #fff; cursor: pointer; }
        button.danger { background: var(--danger); border-color: var(--danger); }
        .muted { color: var(--muted); }
        .row { display: flex; gap: 8px; flex-wrap: wrap; align-items: center; }
    </style>
</head>
<body>
    <header>
        <nav>
            <a class="brand" href="/">ABC Retail Storage</a>
            <a href="/customers">Customers</a>
            <a href="/blobs">Product images</a>
            <a href="/files">Contracts</a>
            <a href="/queue">Order events</a>
        </nav>
    </header>
    <main>
        {% block content %}{% endblock %}
    </main>
</body>
</html>
"##;

const INDEX_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block content %}
<div class="card">
    <h1>Storage dashboard</h1>
    <p class="muted">Manage the four storage resources of this account.</p>
    <table>
        <tr><th>Section</th><th>Resource</th></tr>
        <tr><td><a href="/customers">Customer profiles</a></td><td>table <code>{{ names.table }}</code></td></tr>
        <tr><td><a href="/blobs">Product images</a></td><td>blob container <code>{{ names.blob_container }}</code></td></tr>
        <tr><td><a href="/files">Contracts</a></td><td>file share <code>{{ names.file_share }}</code></td></tr>
        <tr><td><a href="/queue">Order events</a></td><td>queue <code>{{ names.queue }}</code></td></tr>
    </table>
</div>
{% endblock %}
"##;

const CUSTOMERS_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Customers - ABC Retail Storage{% endblock %}
{% block content %}
<div class="card">
    <h2>Add customer</h2>
    <form method="post" action="/customers" class="row">
        <input type="text" name="full_name" placeholder="Full name">
        <input type="email" name="email" placeholder="Email">
        <input type="text" name="favorite_product" placeholder="Favorite product">
        <select name="loyalty_tier">
            {% for tier in tiers %}<option value="{{ tier }}">{{ tier }}</option>{% endfor %}
        </select>
        <button type="submit">Add</button>
    </form>
</div>
<div class="card">
    <h2>Customers</h2>
    {% if customers | length == 0 %}
    <p class="muted">No customers yet.</p>
    {% else %}
    <table>
        <tr><th>Name</th><th>Email</th><th>Favorite product</th><th>Tier</th><th>Modified</th><th></th></tr>
        {% for c in customers %}
        <tr>
            <td>{{ c.full_name }}</td>
            <td>{{ c.email }}</td>
            <td>{{ c.favorite_product }}</td>
            <td>{{ c.loyalty_tier }}</td>
            <td class="muted">{% if c.timestamp %}{{ c.timestamp }}{% endif %}</td>
            <td>
                <a href="/customers/{{ c.row_key | urlencode_strict }}/edit">Edit</a>
                <form class="inline" method="post" action="/customers/{{ c.row_key | urlencode_strict }}/delete">
                    <button type="submit" class="danger">Delete</button>
                </form>
            </td>
        </tr>
        {% endfor %}
    </table>
    {% endif %}
</div>
{% endblock %}
"##;

const CUSTOMER_EDIT_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Edit customer - ABC Retail Storage{% endblock %}
{% block content %}
<div class="card">
    <h2>Edit customer</h2>
    <p class="muted">Identifier <code>{{ customer.row_key }}</code></p>
    <form method="post" action="/customers/{{ customer.row_key | urlencode_strict }}/edit">
        <p><label>Full name<br><input type="text" name="full_name" value="{{ customer.full_name }}"></label></p>
        <p><label>Email<br><input type="email" name="email" value="{{ customer.email }}"></label></p>
        <p><label>Favorite product<br><input type="text" name="favorite_product" value="{{ customer.favorite_product }}"></label></p>
        <p><label>Loyalty tier<br>
            <select name="loyalty_tier">
                {% for tier in tiers %}<option value="{{ tier }}"{% if tier == customer.loyalty_tier %} selected{% endif %}>{{ tier }}</option>{% endfor %}
            </select>
        </label></p>
        <button type="submit">Save</button>
        <a href="/customers">Cancel</a>
    </form>
</div>
{% endblock %}
"##;

/// Shared by the blob and file pages; `section` is the URL prefix.
const OBJECTS_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}{{ heading }} - ABC Retail Storage{% endblock %}
{% block content %}
<div class="card">
    <h2>Upload to {{ resource }}</h2>
    <form method="post" action="/{{ section }}/upload" enctype="multipart/form-data" class="row">
        <input type="file" name="file">
        <button type="submit">Upload</button>
    </form>
</div>
<div class="card">
    <h2>{{ heading }}</h2>
    {% if names | length == 0 %}
    <p class="muted">Nothing here yet.</p>
    {% else %}
    <table>
        <tr><th>Name</th><th></th></tr>
        {% for name in names %}
        <tr>
            <td>{{ name }}</td>
            <td>
                <a href="/{{ section }}/rename?name={{ name | urlencode_strict }}">Rename</a>
                <form class="inline" method="post" action="/{{ section }}/delete">
                    <input type="hidden" name="name" value="{{ name }}">
                    <button type="submit" class="danger">Delete</button>
                </form>
            </td>
        </tr>
        {% endfor %}
    </table>
    {% endif %}
</div>
{% endblock %}
"##;

const RENAME_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Rename - ABC Retail Storage{% endblock %}
{% block content %}
<div class="card">
    <h2>Rename {{ old_name }}</h2>
    {% if non_atomic %}
    <p class="muted">The blob is copied to the new name and the original is then deleted.</p>
    {% endif %}
    <form method="post" action="/{{ section }}/rename">
        <input type="hidden" name="old_name" value="{{ old_name }}">
        <p><label>New name<br><input type="text" name="new_name" value="{{ old_name }}"></label></p>
        <button type="submit">Rename</button>
        <a href="/{{ section }}">Cancel</a>
    </form>
</div>
{% endblock %}
"##;

const QUEUE_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Order events - ABC Retail Storage{% endblock %}
{% block content %}
<div class="card">
    <h2>Send order event</h2>
    <form method="post" action="/queue/send" class="row">
        <input type="text" name="message" placeholder="Order #42">
        <input type="text" name="status" placeholder="Status" list="order-statuses">
        <datalist id="order-statuses">
            {% for status in statuses %}<option value="{{ status }}">{% endfor %}
        </datalist>
        <button type="submit">Send</button>
    </form>
</div>
<div class="card">
    <h2>Queue {{ queue }}</h2>
    <p class="muted">Showing up to {{ max }} visible messages. Viewing does not consume them.</p>
    {% if messages | length == 0 %}
    <p class="muted">The queue is empty.</p>
    {% else %}
    <table>
        <tr><th>Message</th><th>Inserted</th><th>Id</th><th></th></tr>
        {% for m in messages %}
        <tr>
            <td>{{ m.text }}</td>
            <td class="muted">{% if m.inserted_on %}{{ m.inserted_on }}{% endif %}</td>
            <td class="muted"><code>{{ m.id }}</code></td>
            <td>
                <form class="inline" method="post" action="/queue/delete">
                    <input type="hidden" name="message_id" value="{{ m.id }}">
                    <button type="submit" class="danger">Delete</button>
                </form>
            </td>
        </tr>
        {% endfor %}
    </table>
    {% endif %}
</div>
{% endblock %}
"##;

const ERROR_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Error {{ status }} - ABC Retail Storage{% endblock %}
{% block content %}
<div class="card">
    <h1>{{ status }}</h1>
    <p>{{ message }}</p>
    <p class="muted">Request id <code>{{ request_id }}</code></p>
    <a href="/">Return home</a>
</div>
{% endblock %}
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_parse() {
        let names: Vec<_> = TEMPLATES.get_template_names().collect();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_render_error_escapes_message() {
        let html = render_error(502, "<script>alert(1)</script>", "ABC123").unwrap();
        assert!(html.contains("502"));
        assert!(html.contains("ABC123"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn test_objects_template_links_rename() {
        let mut ctx = Context::new();
        ctx.insert("section", "blobs");
        ctx.insert("heading", "Product images");
        ctx.insert("resource", "product-images");
        ctx.insert("names", &vec!["my shoe.png"]);
        let html = render("objects.html", &ctx).unwrap();
        assert!(html.contains("/blobs/rename?name=my%20shoe.png"));
        assert!(html.contains("action=\"/blobs/upload\""));
    }
}
