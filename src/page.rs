//! Pure string-templating of [`Post`]s into complete, self-contained HTML
//! documents: the post detail page, the post-listing page, and the shared
//! nav/footer fragments. Nothing in this module touches the output
//! directory; callers receive `String`s and decide where they land.
//!
//! Front-matter fields are interpolated verbatim: markup in a title or an
//! excerpt lands in the page as-is. This is a known limitation of the page
//! format, not something the renderer papers over.

use std::path::Path;

use chrono::Datelike;

use crate::config::LinkMode;
use crate::post::Post;

/// Site-wide avatar asset, probed relative to the output directory.
const LOCAL_AVATAR: &str = "images/avatar.png";

/// Remote placeholder used when neither a per-post avatar nor the local
/// avatar asset is available.
const FALLBACK_AVATAR: &str =
    "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=100&h=100&fit=crop";

/// Placeholder card image for posts without a cover.
const FALLBACK_COVER: &str =
    "https://images.unsplash.com/photo-1461749280684-dccba630e2f6?w=800&h=400&fit=crop";

/// Maximum number of related posts on a detail page.
const RELATED_POSTS_CAP: usize = 2;

/// Maximum number of tags shown on a listing card.
const CARD_TAG_CAP: usize = 2;

/// Layout parameters shared by every page of one build run.
pub struct PageContext<'a> {
    pub site_title: &'a str,
    pub link_mode: LinkMode,

    /// Root output directory. Probed (per render call, uncached) for the
    /// site-wide avatar asset.
    pub output_directory: &'a Path,
}

/// Computes the link prefix for a page `depth` directories below the site
/// root. Root-absolute mode ignores the depth and always emits a single
/// leading slash.
pub fn link_prefix(mode: LinkMode, depth: usize) -> String {
    match mode {
        LinkMode::RootAbsolute => "/".to_owned(),
        LinkMode::Relative => match depth {
            0 => "./".to_owned(),
            _ => "../".repeat(depth),
        },
    }
}

/// Selects up to [`RELATED_POSTS_CAP`] other posts sharing `post`'s
/// category, preserving the loader's most-recent-first order.
pub fn related_posts<'a>(post: &Post, all_posts: &'a [Post]) -> Vec<&'a Post> {
    all_posts
        .iter()
        .filter(|p| p.slug != post.slug && p.category == post.category)
        .take(RELATED_POSTS_CAP)
        .collect()
}

/// Renders the detail page for one post. `all_posts` is consulted for the
/// related-posts section; the page lives one directory below the site root
/// (depth 1).
pub fn post_page(post: &Post, all_posts: &[Post], ctx: &PageContext) -> String {
    let base = link_prefix(ctx.link_mode, 1);
    let avatar = avatar_url(post, ctx, &base);

    let cover_html = match &post.cover {
        Some(cover) => format!(
            r#"
        <div class="container">
            <div class="article-cover">
                <img src="{cover}" alt="{title}">
            </div>
        </div>"#,
            cover = cover,
            title = post.title,
        ),
        None => String::new(),
    };

    let related = related_posts(post, all_posts);
    let related_html = if related.is_empty() {
        r#"
                <div class="no-related-posts">
                    <p>No related posts yet.</p>
                </div>"#
            .to_owned()
    } else {
        related
            .iter()
            .map(|p| {
                format!(
                    r#"
                <article class="post-card">
                    <div class="post-content">
                        <div class="post-tags">
                            <span class="tag tag-{category_class}">{category}</span>
                        </div>
                        <h3 class="post-title">
                            <a href="{base}posts/{slug}.html">{title}</a>
                        </h3>
                        <p class="post-excerpt">{excerpt}</p>
                    </div>
                </article>"#,
                    category_class = p.category.to_lowercase(),
                    category = p.category,
                    base = base,
                    slug = p.slug,
                    title = p.title,
                    excerpt = p.excerpt,
                )
            })
            .collect::<Vec<_>>()
            .join("")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - {site_title}</title>
    <meta name="description" content="{excerpt}">
    <link rel="stylesheet" href="{base}css/style.css">
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&family=JetBrains+Mono:wght@400;500&display=swap" rel="stylesheet">
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css">
</head>
<body>
{nav}

    <article>
        <header class="article-header">
            <div class="container">
                <div class="article-meta">
                    <div class="post-tags">{tags}</div>
                    <span class="read-time"><i class="far fa-clock"></i> {read_time} min read</span>
                </div>
                <h1 class="article-title">{title}</h1>
                <div class="post-meta" style="justify-content: flex-start; gap: 2rem;">
                    <div class="author">
                        <img src="{avatar}" alt="{author}" class="author-avatar">
                        <div>
                            <span class="author-name">{author}</span><br>
                            <span style="font-size: 0.875rem; color: var(--text-muted);">Software Engineer</span>
                        </div>
                    </div>
                    <span class="post-date">{date}</span>
                </div>
            </div>
        </header>
{cover}

        <div class="article-content">
            {html}
        </div>
    </article>

    <section style="background: var(--bg-secondary); padding: 3rem 0;">
        <div class="container">
            <div style="display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem;">
                <div>
                    <h3>Enjoyed this article?</h3>
                    <p style="color: var(--text-secondary);">Share it with other developers</p>
                </div>
                <div style="display: flex; gap: 1rem;">
                    <button class="btn btn-secondary"><i class="fab fa-twitter"></i><span>Twitter</span></button>
                    <button class="btn btn-secondary"><i class="fab fa-linkedin"></i><span>LinkedIn</span></button>
                </div>
            </div>
        </div>
    </section>

    <section class="featured-section">
        <div class="container">
            <div class="section-header">
                <h2 class="section-title">Related Posts</h2>
            </div>
            <div class="featured-grid" style="grid-template-columns: repeat(2, 1fr);">{related}
            </div>
        </div>
    </section>

{footer}

    <script src="{base}js/main.js"></script>
</body>
</html>"#,
        title = post.title,
        site_title = ctx.site_title,
        excerpt = post.excerpt,
        base = base,
        nav = nav(ctx, &base),
        tags = tags_html(post, None),
        read_time = post.read_time,
        avatar = avatar,
        author = post.author,
        date = format_date(post),
        cover = cover_html,
        html = post.html,
        related = related_html,
        footer = footer(ctx, &base),
    )
}

/// Renders the post-listing page: one card per post, in the loader's order.
/// The configured page size is not applied; the full list is always rendered
/// in one page.
pub fn listing_page(posts: &[Post], ctx: &PageContext) -> String {
    let base = link_prefix(ctx.link_mode, 0);
    let cards = posts
        .iter()
        .map(|p| post_card(p, ctx, &base))
        .collect::<Vec<_>>()
        .join("\n\n                ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>All Posts - {site_title}</title>
    <link rel="stylesheet" href="{base}css/style.css">
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&family=JetBrains+Mono:wght@400;500&display=swap" rel="stylesheet">
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css">
</head>
<body>
{nav}

    <header class="page-header">
        <div class="container">
            <h1 class="page-title">All Posts</h1>
            <p class="page-description">{count} technical articles</p>
        </div>
    </header>

    <section class="featured-section">
        <div class="container">
            <div class="featured-grid">
                {cards}
            </div>
        </div>
    </section>

{footer}

    <script src="{base}js/main.js"></script>
</body>
</html>"#,
        site_title = ctx.site_title,
        base = base,
        nav = nav(ctx, &base),
        count = posts.len(),
        cards = cards,
        footer = footer(ctx, &base),
    )
}

/// Renders one listing card for a post. `base` is the link prefix of the
/// page the card is embedded in.
pub fn post_card(post: &Post, ctx: &PageContext, base: &str) -> String {
    let cover = post.cover.as_deref().unwrap_or(FALLBACK_COVER);
    format!(
        r#"<article class="post-card">
                    <div class="post-image">
                        <img src="{cover}" alt="{title}">
                        <div class="post-overlay">
                            <span class="read-time"><i class="far fa-clock"></i> {read_time} min</span>
                        </div>
                    </div>
                    <div class="post-content">
                        <div class="post-tags">{tags}</div>
                        <h3 class="post-title"><a href="{base}posts/{slug}.html">{title}</a></h3>
                        <p class="post-excerpt">{excerpt}</p>
                        <div class="post-meta">
                            <div class="author">
                                <img src="{avatar}" alt="{author}" class="author-avatar">
                                <span class="author-name">{author}</span>
                            </div>
                            <span class="post-date">{date}</span>
                        </div>
                    </div>
                </article>"#,
        cover = cover,
        title = post.title,
        read_time = post.read_time,
        tags = tags_html(post, Some(CARD_TAG_CAP)),
        base = base,
        slug = post.slug,
        excerpt = post.excerpt,
        avatar = avatar_url(post, ctx, base),
        author = post.author,
        date = format_date(post),
    )
}

/// Renders the post's tag spans, capped at `cap` when given. A post without
/// tags gets exactly one synthetic tag derived from its category.
fn tags_html(post: &Post, cap: Option<usize>) -> String {
    if post.tags.is_empty() {
        return format!(
            r#"<span class="tag tag-{class}">{category}</span>"#,
            class = post.category.to_lowercase(),
            category = post.category,
        );
    }
    let cap = cap.unwrap_or(post.tags.len());
    post.tags
        .iter()
        .take(cap)
        .map(|tag| format!(r#"<span class="tag">{}</span>"#, tag))
        .collect::<Vec<_>>()
        .join("")
}

/// Resolves the avatar for a post: the per-post URL when present, otherwise
/// the local site-wide asset when it exists on disk, otherwise the remote
/// placeholder. The existence probe runs on every call.
fn avatar_url(post: &Post, ctx: &PageContext, base: &str) -> String {
    if let Some(avatar) = &post.author_avatar {
        return avatar.clone();
    }
    if ctx.output_directory.join(LOCAL_AVATAR).is_file() {
        format!("{}{}", base, LOCAL_AVATAR)
    } else {
        FALLBACK_AVATAR.to_owned()
    }
}

fn format_date(post: &Post) -> String {
    post.date.format("%B %-d, %Y").to_string()
}

fn nav(ctx: &PageContext, base: &str) -> String {
    format!(
        r#"    <nav class="navbar">
        <div class="nav-container">
            <a href="{base}index.html" class="nav-logo">
                <span class="logo-icon">&lt;/&gt;</span>
                <span class="logo-text">{site_title}</span>
            </a>
            <ul class="nav-menu">
                <li><a href="{base}index.html" class="nav-link">Home</a></li>
                <li><a href="{base}posts.html" class="nav-link">Posts</a></li>
                <li><a href="{base}about.html" class="nav-link">About</a></li>
                <li><a href="{base}contact.html" class="nav-link">Contact</a></li>
            </ul>
            <div class="nav-actions">
                <button class="theme-toggle" id="themeToggle"><i class="fas fa-moon"></i></button>
                <button class="mobile-menu-toggle" id="mobileMenuToggle"><i class="fas fa-bars"></i></button>
            </div>
        </div>
    </nav>"#,
        base = base,
        site_title = ctx.site_title,
    )
}

fn footer(ctx: &PageContext, base: &str) -> String {
    let year = chrono::Utc::now().year();
    format!(
        r##"    <footer class="footer">
        <div class="container">
            <div class="footer-grid">
                <div class="footer-brand">
                    <a href="{base}index.html" class="footer-logo">
                        <span class="logo-icon">&lt;/&gt;</span>
                        <span class="logo-text">{site_title}</span>
                    </a>
                    <p class="footer-description">Notes on engineering, one post at a time.</p>
                    <div class="social-links">
                        <a href="#" class="social-link"><i class="fab fa-github"></i></a>
                        <a href="#" class="social-link"><i class="fab fa-twitter"></i></a>
                        <a href="#" class="social-link"><i class="fab fa-linkedin"></i></a>
                        <a href="#" class="social-link"><i class="fas fa-rss"></i></a>
                    </div>
                </div>
                <div class="footer-links">
                    <h4>Quick Links</h4>
                    <ul>
                        <li><a href="{base}index.html">Home</a></li>
                        <li><a href="{base}posts.html">Posts</a></li>
                        <li><a href="{base}about.html">About</a></li>
                        <li><a href="{base}contact.html">Contact</a></li>
                    </ul>
                </div>
                <div class="footer-links">
                    <h4>Topics</h4>
                    <ul>
                        <li><a href="#">Rust</a></li>
                        <li><a href="#">TypeScript</a></li>
                        <li><a href="#">Databases</a></li>
                        <li><a href="#">Cloud</a></li>
                    </ul>
                </div>
            </div>
            <div class="footer-bottom">
                <p>&copy; {year} {site_title}. All rights reserved.</p>
                <p>Made with <i class="fas fa-heart"></i> and lots of <i class="fas fa-coffee"></i></p>
            </div>
        </div>
    </footer>"##,
        base = base,
        site_title = ctx.site_title,
        year = year,
    )
}
