//! `techblog` generates a personal technology blog from Markdown sources.
//! The [`post`] module parses front-matter-bearing Markdown files into
//! [`post::Post`] structures, the [`page`] module renders them into
//! self-contained HTML pages, and the [`build`] module orchestrates a full
//! site build from a [`config::Config`]. The [`serve`] module adds a
//! rebuild-on-change development server, and the [`relay`] module hosts the
//! small OAuth relay used by the CMS login flow.
#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod page;
pub mod post;
pub mod relay;
pub mod serve;
