//! Element locators compiled to DOM queries
//!
//! A [`Locator`] describes elements the way a user perceives them: by ARIA
//! role and accessible name, by visible text, or by placeholder, falling back
//! to CSS only where the application offers nothing better. Locators compile
//! to a JavaScript function `(root) => Element[]`; the driver wraps that
//! function in one of the action scripts below and evaluates it inside the
//! page or a content frame's document.
//!
//! Names are compared after whitespace normalisation. [`NameMatch::Exact`]
//! is the default everywhere two expected labels share a prefix, so a
//! `"Product"` locator never resolves to a `"Product Supplier"` column.

use serde_json::json;
use std::fmt;

/// ARIA roles the harness queries, with their implicit HTML equivalents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AriaRole {
    Button,
    Cell,
    Checkbox,
    ColumnHeader,
    Heading,
    Link,
    Navigation,
    Region,
    Table,
    Textbox,
}

impl AriaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AriaRole::Button => "button",
            AriaRole::Cell => "cell",
            AriaRole::Checkbox => "checkbox",
            AriaRole::ColumnHeader => "columnheader",
            AriaRole::Heading => "heading",
            AriaRole::Link => "link",
            AriaRole::Navigation => "navigation",
            AriaRole::Region => "region",
            AriaRole::Table => "table",
            AriaRole::Textbox => "textbox",
        }
    }

    /// CSS selecting every element that carries this role explicitly or implicitly
    fn selector(&self) -> &'static str {
        match self {
            AriaRole::Button => {
                "button, input[type=button], input[type=submit], input[type=reset], [role=button]"
            }
            AriaRole::Cell => "td, [role=cell], [role=gridcell]",
            AriaRole::Checkbox => "input[type=checkbox], [role=checkbox]",
            AriaRole::ColumnHeader => "th, [role=columnheader]",
            AriaRole::Heading => "h1, h2, h3, h4, h5, h6, [role=heading]",
            AriaRole::Link => "a[href], [role=link]",
            AriaRole::Navigation => "nav, [role=navigation]",
            AriaRole::Region => {
                "section[aria-label], section[aria-labelledby], [role=region]"
            }
            AriaRole::Table => "table, [role=table], [role=grid]",
            AriaRole::Textbox => {
                "input:not([type]), input[type=text], input[type=email], input[type=search], \
                 textarea, [role=textbox], [role=searchbox]"
            }
        }
    }
}

impl fmt::Display for AriaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an accessible name or text content is compared
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameMatch {
    /// Whole normalised string equals the value
    Exact(String),
    /// Normalised string contains the value
    Contains(String),
    /// Normalised string contains at least one of the values
    ContainsAny(Vec<String>),
    /// Anything but whitespace
    NonEmpty,
}

impl NameMatch {
    pub fn exact(value: impl Into<String>) -> Self {
        NameMatch::Exact(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        NameMatch::Contains(value.into())
    }

    /// Evaluate the match against an already-extracted name
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = normalize(candidate);
        match self {
            NameMatch::Exact(v) => candidate == normalize(v),
            NameMatch::Contains(v) => candidate.contains(&normalize(v)),
            NameMatch::ContainsAny(vs) => vs.iter().any(|v| candidate.contains(&normalize(v))),
            NameMatch::NonEmpty => !candidate.is_empty(),
        }
    }

    fn to_js(&self) -> String {
        let matcher = match self {
            NameMatch::Exact(v) => json!({ "kind": "exact", "values": [normalize(v)] }),
            NameMatch::Contains(v) => json!({ "kind": "contains", "values": [normalize(v)] }),
            NameMatch::ContainsAny(vs) => json!({
                "kind": "contains",
                "values": vs.iter().map(|v| normalize(v)).collect::<Vec<_>>(),
            }),
            NameMatch::NonEmpty => json!({ "kind": "non_empty", "values": [] }),
        };
        matcher.to_string()
    }
}

impl fmt::Display for NameMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameMatch::Exact(v) => write!(f, "{:?}", v),
            NameMatch::Contains(v) => write!(f, "~{:?}", v),
            NameMatch::ContainsAny(vs) => {
                let parts: Vec<_> = vs.iter().map(|v| format!("{:?}", v)).collect();
                write!(f, "~{}", parts.join("|"))
            }
            NameMatch::NonEmpty => f.write_str("<non-empty>"),
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A query resolving to zero or more elements under some root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    Role {
        role: AriaRole,
        name: Option<NameMatch>,
    },
    /// Innermost elements whose text matches
    Text(NameMatch),
    /// Inputs whose placeholder equals the value
    Placeholder(String),
    Nth {
        inner: Box<Locator>,
        index: usize,
    },
    /// `child` resolved under every element `parent` resolves to
    Within {
        parent: Box<Locator>,
        child: Box<Locator>,
    },
    /// Table body rows whose text contains the key
    RowContaining(String),
    /// Checkboxes (native or ARIA) among `inner` that are checked
    Checked(Box<Locator>),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn role(role: AriaRole) -> Self {
        Locator::Role { role, name: None }
    }

    pub fn role_named(role: AriaRole, name: NameMatch) -> Self {
        Locator::Role {
            role,
            name: Some(name),
        }
    }

    /// Role with an exact accessible name, the usual way to pin an element
    pub fn exact(role: AriaRole, name: impl Into<String>) -> Self {
        Self::role_named(role, NameMatch::exact(name))
    }

    pub fn text(matcher: NameMatch) -> Self {
        Locator::Text(matcher)
    }

    pub fn placeholder(value: impl Into<String>) -> Self {
        Locator::Placeholder(value.into())
    }

    pub fn row_containing(key: impl Into<String>) -> Self {
        Locator::RowContaining(key.into())
    }

    pub fn nth(self, index: usize) -> Self {
        Locator::Nth {
            inner: Box::new(self),
            index,
        }
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Resolve `child` inside whatever `self` resolves to
    pub fn child(self, child: Locator) -> Self {
        Locator::Within {
            parent: Box::new(self),
            child: Box::new(child),
        }
    }

    pub fn checked(self) -> Self {
        Locator::Checked(Box::new(self))
    }

    /// Compile to a JavaScript function expression `(root) => Element[]`
    pub fn compile(&self) -> String {
        match self {
            Locator::Css(selector) => format!(
                "((r) => Array.from(r.querySelectorAll({})))",
                js_string(selector)
            ),
            Locator::Role { role, name } => format!(
                "((r) => H.byRole(r, {}, {}))",
                js_string(role.selector()),
                name.as_ref().map(NameMatch::to_js).unwrap_or_else(|| "null".to_string())
            ),
            Locator::Text(matcher) => format!("((r) => H.byText(r, {}))", matcher.to_js()),
            Locator::Placeholder(value) => format!(
                "((r) => Array.from(r.querySelectorAll('[placeholder]')).filter((el) => el.getAttribute('placeholder') === {}))",
                js_string(value)
            ),
            Locator::Nth { inner, index } => format!(
                "((r) => {{ const a = {}(r); return a.length > {index} ? [a[{index}]] : []; }})",
                inner.compile()
            ),
            Locator::Within { parent, child } => format!(
                "((r) => {}(r).flatMap((p) => {}(p)))",
                parent.compile(),
                child.compile()
            ),
            Locator::RowContaining(key) => format!(
                "((r) => Array.from(r.querySelectorAll('tbody tr, [role=row]')).filter((tr) => H.norm(tr.textContent).includes({})))",
                js_string(&normalize(key))
            ),
            Locator::Checked(inner) => format!(
                "((r) => {}(r).filter((el) => el.checked === true || el.getAttribute('aria-checked') === 'true'))",
                inner.compile()
            ),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css {}", selector),
            Locator::Role { role, name: None } => write!(f, "{}", role),
            Locator::Role {
                role,
                name: Some(name),
            } => write!(f, "{} {}", role, name),
            Locator::Text(matcher) => write!(f, "text {}", matcher),
            Locator::Placeholder(value) => write!(f, "input[placeholder={:?}]", value),
            Locator::Nth { inner, index } => write!(f, "{} #{}", inner, index),
            Locator::Within { parent, child } => write!(f, "{} >> {}", parent, child),
            Locator::RowContaining(key) => write!(f, "row containing {:?}", key),
            Locator::Checked(inner) => write!(f, "checked {}", inner),
        }
    }
}

/// Quote a string as a JavaScript literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Helper object shared by every compiled locator
const PRELUDE: &str = r#"
const H = {
  norm: (s) => (s || '').replace(/\s+/g, ' ').trim(),
  visible: (el) => {
    if (!el || !el.isConnected) return false;
    const style = el.ownerDocument.defaultView.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || parseFloat(style.opacity) === 0) return false;
    const box = el.getBoundingClientRect();
    return box.width > 0 && box.height > 0;
  },
  name: (el) => {
    const aria = el.getAttribute('aria-label');
    if (aria && H.norm(aria)) return H.norm(aria);
    const by = el.getAttribute('aria-labelledby');
    if (by) {
      const text = by.split(/\s+/).map((id) => el.ownerDocument.getElementById(id)).filter(Boolean).map((n) => n.textContent).join(' ');
      if (H.norm(text)) return H.norm(text);
    }
    if (['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName)) {
      if (el.labels && el.labels.length) return H.norm(Array.from(el.labels).map((l) => l.textContent).join(' '));
      return H.norm(el.getAttribute('placeholder') || el.getAttribute('title') || el.value);
    }
    return H.norm(el.innerText || el.textContent) || H.norm(el.getAttribute('title'));
  },
  matches: (value, m) => {
    if (!m) return true;
    const v = H.norm(value);
    if (m.kind === 'exact') return m.values.some((x) => v === x);
    if (m.kind === 'contains') return m.values.some((x) => v.includes(x));
    if (m.kind === 'non_empty') return v.length > 0;
    return false;
  },
  byRole: (root, selector, m) => Array.from(root.querySelectorAll(selector)).filter((el) => H.matches(H.name(el), m)),
  byText: (root, m) => Array.from(root.querySelectorAll('*'))
    .filter((el) => !['SCRIPT', 'STYLE', 'NOSCRIPT', 'HEAD', 'TITLE'].includes(el.tagName))
    .filter((el) => H.matches(el.innerText || el.textContent, m))
    .filter((el) => !Array.from(el.children).some((c) => H.matches(c.innerText || c.textContent, m))),
  first: (loc) => loc(document).find(H.visible),
};
"#;

fn wrap(body: &str) -> String {
    format!("(() => {{ {}\n{} }})()", PRELUDE, body)
}

/// Script returning the number of visible matches
pub fn count_visible_script(locator: &Locator) -> String {
    wrap(&format!(
        "return {}(document).filter(H.visible).length;",
        locator.compile()
    ))
}

/// Script returning whether the first visible match can receive a click:
/// enabled, and not covered by another element at its centre point
pub fn interactable_script(locator: &Locator) -> String {
    wrap(&format!(
        r#"const el = H.first({});
if (!el || el.disabled || el.getAttribute('aria-disabled') === 'true') return false;
el.scrollIntoView({{ block: 'center', inline: 'center' }});
const box = el.getBoundingClientRect();
const hit = document.elementFromPoint(box.left + box.width / 2, box.top + box.height / 2);
return !!hit && (hit === el || el.contains(hit));"#,
        locator.compile()
    ))
}

/// Script clicking the first visible match; returns false when nothing matched
pub fn click_script(locator: &Locator) -> String {
    wrap(&format!(
        r#"const el = H.first({});
if (!el) return false;
el.scrollIntoView({{ block: 'center', inline: 'center' }});
el.click();
return true;"#,
        locator.compile()
    ))
}

/// Script replacing the value of the first visible match and firing the
/// events frameworks listen for; returns false when nothing matched
pub fn fill_script(locator: &Locator, text: &str) -> String {
    wrap(&format!(
        r#"const el = H.first({});
if (!el) return false;
el.focus();
const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
setter.call(el, {});
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return true;"#,
        locator.compile(),
        js_string(text)
    ))
}

/// Script dispatching a key press to the focused element
pub fn press_key_script(key: &str) -> String {
    wrap(&format!(
        r#"const target = document.activeElement || document.body;
for (const type of ['keydown', 'keyup']) {{
  target.dispatchEvent(new KeyboardEvent(type, {{ key: {}, bubbles: true, cancelable: true }}));
}}
return true;"#,
        js_string(key)
    ))
}
