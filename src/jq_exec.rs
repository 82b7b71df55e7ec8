//! jq pre-filter for example documents.
//!
//! Example data rarely arrives in the workbook/sheet/block shape the inferrer
//! reads; a jq expression reshapes each document first. One input can yield
//! any number of outputs.

use jaq_core::{compile::Undefined, load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

use crate::error::{Error, Result};

pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in outputs {
        let v = item.map_err(|e| Error::Jq(format!("{e:?}")))?;
        out.push(serde_json::from_str(&v.to_string())?);
    }
    Ok(out)
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> Error {
    let mut s = String::new();
    for (file, err) in errs {
        s.push_str(&format!("parse error: {err:?} in `{}`\n", file.code));
    }
    Error::Jq(s.trim_end().to_string())
}

fn format_undefined_errors(errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> Error {
    let mut s = String::new();
    for (file, list) in errs {
        for (name, undef) in list {
            s.push_str(&format!("undefined `{name}`: {undef:?} in `{}`\n", file.code));
        }
    }
    Error::Jq(s.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reshapes_documents() {
        let input = json!({"data": {"blocks": [{"name": "a_list"}]}});
        let out = run_jaq(".data", &input).unwrap();
        assert_eq!(out, vec![json!({"blocks": [{"name": "a_list"}]})]);
    }

    #[test]
    fn one_input_can_yield_many() {
        let out = run_jaq(".[]", &json!([1, 2, 3])).unwrap();
        assert_eq!(out, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn bad_filters_are_jq_errors() {
        assert!(matches!(run_jaq(".[", &json!(null)), Err(Error::Jq(_))));
        assert!(matches!(run_jaq("no_such_fn", &json!(null)), Err(Error::Jq(_))));
    }
}
