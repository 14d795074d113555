//! Elixir Term Conversion Utilities
//!
//! Converts micro-DOM trees to and from Elixir terms:
//!
//! ```text
//! {:document, children}
//! {:container, children}
//! {:element, namespace_uri | nil, tag_name, [{name, value | nil}], children}
//! {:text, content | nil, ignorable_whitespace}
//! {:cdata, content | nil}
//! {:comment, content | nil}
//! {:doctype, qualified_name | nil, public_id | nil, system_id | nil}
//! {:entity_reference, name | nil}
//! {:processing_instruction, target | nil, data | nil}
//! ```

use rustler::types::tuple::{get_tuple, make_tuple};
use rustler::{Atom, Encoder, Env, Error, NewBinary, NifResult, Term};

use crate::dom::{Attribute, Element, NodeData, NodeId, Tree, ROOT};

// Pre-defined atoms for efficiency - created once at compile time
rustler::atoms! {
    ok,
    error,
    document,
    container,
    element,
    text,
    cdata,
    comment,
    doctype,
    entity_reference,
    processing_instruction,
}

/// Convert an Elixir node term into a tree
///
/// Any term that does not follow the node shapes is a `BadArg`.
/// Uses an explicit stack so deeply nested terms cannot overflow.
pub fn term_to_tree(term: Term<'_>) -> NifResult<Tree> {
    let (data, children) = decode_node(term)?;
    let mut tree = Tree::new(data);

    // Pending (parent, child) pairs; children pushed in reverse so the first is handled first
    let mut stack: Vec<(NodeId, Term<'_>)> = Vec::new();
    stack.extend(children.into_iter().rev().map(|child| (ROOT, child)));

    while let Some((parent, term)) = stack.pop() {
        let (data, children) = decode_node(term)?;
        let id = tree.append_child(parent, data).map_err(|_| Error::BadArg)?;
        stack.extend(children.into_iter().rev().map(|child| (id, child)));
    }

    Ok(tree)
}

/// Decode one node tuple, returning its payload and its unconverted children
fn decode_node(term: Term<'_>) -> NifResult<(NodeData, Vec<Term<'_>>)> {
    let fields = get_tuple(term)?;
    let (tag, rest) = fields.split_first().ok_or(Error::BadArg)?;
    let tag: Atom = tag.decode()?;

    let data = match rest {
        [children] if tag == document() => return Ok((NodeData::Document, children.decode()?)),
        [children] if tag == container() => return Ok((NodeData::Container, children.decode()?)),
        [namespace_uri, tag_name, attributes, children] if tag == element() => {
            let attributes: Vec<(String, Option<String>)> = attributes.decode()?;
            let element = Element {
                namespace_uri: namespace_uri.decode()?,
                tag_name: tag_name.decode()?,
                attributes: attributes
                    .into_iter()
                    .map(|(name, value)| Attribute { name, value })
                    .collect(),
            };
            return Ok((NodeData::Element(element), children.decode()?));
        }
        [content, ignorable] if tag == text() => NodeData::Text {
            content: content.decode()?,
            ignorable_whitespace: ignorable.decode()?,
        },
        [content] if tag == cdata() => NodeData::CData(content.decode()?),
        [content] if tag == comment() => NodeData::Comment(content.decode()?),
        [qualified_name, public_id, system_id] if tag == doctype() => NodeData::DocumentType {
            qualified_name: qualified_name.decode()?,
            public_id: public_id.decode()?,
            system_id: system_id.decode()?,
        },
        [name] if tag == entity_reference() => NodeData::EntityReference(name.decode()?),
        [target, data] if tag == processing_instruction() => NodeData::ProcessingInstruction {
            target: target.decode()?,
            data: data.decode()?,
        },
        _ => return Err(Error::BadArg),
    };
    Ok((data, Vec::new()))
}

/// Convert a tree into its Elixir node term
///
/// Builds terms bottom-up with an explicit stack so deep trees cannot overflow.
pub fn tree_to_term<'a>(env: Env<'a>, tree: &Tree) -> Term<'a> {
    enum Visit {
        Enter(NodeId),
        Leave(NodeId),
    }

    // Finished terms of nodes whose parent has not been left yet
    let mut done: Vec<Term<'a>> = Vec::new();
    let mut stack = vec![Visit::Enter(ROOT)];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(id) => {
                stack.push(Visit::Leave(id));
                let mut child_id = tree.get_node(id).and_then(|n| n.last_child);
                while let Some(cid) = child_id {
                    stack.push(Visit::Enter(cid));
                    child_id = tree.get_node(cid).and_then(|n| n.prev_sibling);
                }
            }
            Visit::Leave(id) => {
                let count = tree.children(id).count();
                let children = done.split_off(done.len() - count);
                let term = match tree.data(id) {
                    Some(data) => node_to_term(env, data, children),
                    None => rustler::types::atom::nil().encode(env),
                };
                done.push(term);
            }
        }
    }

    done.pop()
        .unwrap_or_else(|| rustler::types::atom::nil().encode(env))
}

/// Convert one node payload, given its already converted children
fn node_to_term<'a>(env: Env<'a>, data: &NodeData, children: Vec<Term<'a>>) -> Term<'a> {
    let fields = match data {
        NodeData::Document => vec![document().encode(env), children.encode(env)],
        NodeData::Container => vec![container().encode(env), children.encode(env)],
        NodeData::Element(e) => {
            // Build attributes in reverse order with list_prepend
            let mut attrs = Term::list_new_empty(env);
            for attr in e.attributes.iter().rev() {
                let pair = make_tuple(
                    env,
                    &[
                        str_to_binary(env, &attr.name),
                        opt_to_term(env, attr.value.as_deref()),
                    ],
                );
                attrs = attrs.list_prepend(pair);
            }
            vec![
                element().encode(env),
                opt_to_term(env, e.namespace_uri.as_deref()),
                str_to_binary(env, &e.tag_name),
                attrs,
                children.encode(env),
            ]
        }
        NodeData::Text {
            content,
            ignorable_whitespace,
        } => vec![
            text().encode(env),
            opt_to_term(env, content.as_deref()),
            ignorable_whitespace.encode(env),
        ],
        NodeData::CData(content) => vec![cdata().encode(env), opt_to_term(env, content.as_deref())],
        NodeData::Comment(content) => {
            vec![comment().encode(env), opt_to_term(env, content.as_deref())]
        }
        NodeData::DocumentType {
            qualified_name,
            public_id,
            system_id,
        } => vec![
            doctype().encode(env),
            opt_to_term(env, qualified_name.as_deref()),
            opt_to_term(env, public_id.as_deref()),
            opt_to_term(env, system_id.as_deref()),
        ],
        NodeData::EntityReference(name) => vec![
            entity_reference().encode(env),
            opt_to_term(env, name.as_deref()),
        ],
        NodeData::ProcessingInstruction { target, data } => vec![
            processing_instruction().encode(env),
            opt_to_term(env, target.as_deref()),
            opt_to_term(env, data.as_deref()),
        ],
    };
    make_tuple(env, &fields)
}

/// Absent strings become nil
#[inline]
fn opt_to_term<'a>(env: Env<'a>, s: Option<&str>) -> Term<'a> {
    match s {
        Some(s) => str_to_binary(env, s),
        None => rustler::types::atom::nil().encode(env),
    }
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    bytes_to_binary(env, s.as_bytes())
}

/// Create a binary from bytes
pub fn bytes_to_binary<'a>(env: Env<'a>, bytes: &[u8]) -> Term<'a> {
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}

/// `{:ok, value}`
pub fn ok_tuple<'a>(env: Env<'a>, value: Term<'a>) -> Term<'a> {
    make_tuple(env, &[ok().encode(env), value])
}

/// `{:error, reason}` with the error's message as a binary
pub fn error_tuple<'a>(env: Env<'a>, reason: &impl std::fmt::Display) -> Term<'a> {
    make_tuple(env, &[error().encode(env), str_to_binary(env, &reason.to_string())])
}
