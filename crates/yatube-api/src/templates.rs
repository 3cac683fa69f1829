//! HTML templates, compiled into the binary.

use std::sync::LazyLock;

use tera::{Context, Tera};

use crate::middleware::Claims;

static TEMPLATES: LazyLock<Tera> = LazyLock::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("includes/macros.html", include_str!("../templates/includes/macros.html")),
        ("posts/index.html", include_str!("../templates/posts/index.html")),
        ("posts/group_list.html", include_str!("../templates/posts/group_list.html")),
        ("posts/profile.html", include_str!("../templates/posts/profile.html")),
        ("posts/post_detail.html", include_str!("../templates/posts/post_detail.html")),
        ("posts/create_post.html", include_str!("../templates/posts/create_post.html")),
        ("posts/follow.html", include_str!("../templates/posts/follow.html")),
        ("users/signup.html", include_str!("../templates/users/signup.html")),
        ("users/login.html", include_str!("../templates/users/login.html")),
        ("users/logged_out.html", include_str!("../templates/users/logged_out.html")),
        ("about/author.html", include_str!("../templates/about/author.html")),
        ("about/tech.html", include_str!("../templates/about/tech.html")),
        ("core/404.html", include_str!("../templates/core/404.html")),
        ("core/500.html", include_str!("../templates/core/500.html")),
    ])
    .expect("built-in templates must parse");
    tera
});

/// Context every page starts from; `viewer` is null for anonymous requests.
pub fn context(viewer: Option<&Claims>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("viewer", &viewer);
    ctx
}

pub fn render(name: &str, ctx: &Context) -> Result<String, tera::Error> {
    TEMPLATES.render(name, ctx)
}
