//! Built-in Handlebars helpers.
//!
//! - `md-pages`: block helper rendering its block once per document of a
//!   collection, e.g. `{{#md-pages "src/posts/*.hbs"}}<li>{{title}}</li>{{/md-pages}}`.
//!   An `{{else}}` block renders when nothing matches.
//! - `markdown`: converts Markdown to HTML, inline (`{{markdown text}}`) or
//!   around a block (`{{#markdown}}...{{/markdown}}`).

use handlebars::{
    BlockContext, Context, Handlebars, Helper, HelperDef, HelperResult, JsonRender, Output,
    RenderContext, RenderErrorReason, Renderable,
};
use pulldown_cmark::{Options, Parser, html::push_html};
use serde_json::json;

use crate::aggregate::{Aggregator, glob_patterns};

/// Name of the collection helper.
pub const MD_PAGES: &str = "md-pages";

/// Name of the Markdown helper.
pub const MARKDOWN: &str = "markdown";

/// Register every built-in helper.
pub fn register_builtins(registry: &mut Handlebars<'_>, aggregator: Aggregator) {
    registry.register_helper(MD_PAGES, Box::new(MdPagesHelper { aggregator }));
    registry.register_helper(MARKDOWN, Box::new(MarkdownHelper));
}

/// Renders its block once per document matching the glob arguments.
#[derive(Debug, Clone)]
pub struct MdPagesHelper {
    aggregator: Aggregator,
}

impl HelperDef for MdPagesHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let template = h
            .template()
            .ok_or(RenderErrorReason::BlockContentRequired)?;

        let mut patterns = Vec::new();
        for param in h.params() {
            let globs = glob_patterns(param.value())
                .ok_or(RenderErrorReason::InvalidParamType("glob string or list of globs"))?;
            patterns.extend(globs);
        }
        if patterns.is_empty() {
            return Err(RenderErrorReason::ParamNotFoundForIndex(MD_PAGES, 0).into());
        }

        let documents = self
            .aggregator
            .collect(r, &patterns)
            .map_err(|e| RenderErrorReason::NestedError(Box::new(e)))?;

        if documents.is_empty() {
            if let Some(inverse) = h.inverse() {
                inverse.render(r, ctx, rc, out)?;
            }
            return Ok(());
        }

        let len = documents.len();
        for (i, document) in documents.into_iter().enumerate() {
            let mut block = BlockContext::new();
            block.set_base_value(document);
            block.set_local_var("index", json!(i));
            block.set_local_var("first", json!(i == 0));
            block.set_local_var("last", json!(i + 1 == len));

            rc.push_block(block);
            let result = template.render(r, ctx, rc, out);
            rc.pop_block();
            result?;
        }

        Ok(())
    }
}

/// Converts Markdown to HTML.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownHelper;

impl HelperDef for MarkdownHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let source = match h.template() {
            Some(template) => template.renders(r, ctx, rc)?,
            None => h
                .param(0)
                .ok_or(RenderErrorReason::ParamNotFoundForIndex(MARKDOWN, 0))?
                .value()
                .render(),
        };

        out.write(&render_markdown(&source))?;
        Ok(())
    }
}

/// Render Markdown to HTML with tables, footnotes, strikethrough and task lists.
#[must_use]
pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut html = String::with_capacity(source.len() * 3 / 2);
    push_html(&mut html, Parser::new_ext(source, options));
    html
}
