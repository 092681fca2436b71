//! DOM anchors.
//!
//! Live nodes are serialized as the child-index path from the document
//! root and resolved again against the hydration root.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::rc::Rc;

use crate::validate::{CompilerError, ERR_ANCHOR_NOT_FOUND};

pub fn parse_html(html: &str) -> Result<Handle, CompilerError> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| {
            CompilerError::runtime(
                ERR_ANCHOR_NOT_FOUND,
                &format!("Failed to parse HTML: {}", e),
                None,
            )
        })?;
    Ok(dom.document)
}

fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

/// Child-index path from the topmost ancestor down to `node`.
pub fn path_of(node: &Handle) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = node.clone();
    while let Some(parent) = parent_of(&current) {
        let index = parent
            .children
            .borrow()
            .iter()
            .position(|child| Rc::ptr_eq(child, &current));
        match index {
            Some(index) => path.push(index),
            None => break,
        }
        current = parent;
    }
    path.reverse();
    path
}

pub fn resolve_path(root: &Handle, path: &[usize]) -> Option<Handle> {
    let mut current = root.clone();
    for &index in path {
        let next = current.children.borrow().get(index).cloned()?;
        current = next;
    }
    Some(current)
}

/// Tag name of an element node, for diagnostics.
pub fn describe(node: &Handle) -> String {
    match &node.data {
        NodeData::Document => "#document".to_string(),
        NodeData::Element { name, .. } => format!("<{}>", name.local),
        NodeData::Text { .. } => "#text".to_string(),
        NodeData::Comment { .. } => "#comment".to_string(),
        _ => "#node".to_string(),
    }
}
