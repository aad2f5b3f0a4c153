//! Commands answered by the ICD API.

use std::io::Write;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use icd_api::{Transport, extract_release_id, query_escape, remote_error};
use icd_config::{RELEASE_INDEX_PATH, RELEASE_PLACEHOLDER};
use icd_core::Args;

use crate::json::{strip_tags, text};
use crate::session::Session;

/// GET `path`; an error-shaped result becomes an error.
fn fetch<T: Transport>(session: &mut Session<T>, path: &str) -> Result<Value> {
    let value = session.api()?.call(path)?;
    if let Some(err) = remote_error(&value) {
        return Err(err).with_context(|| format!("GET {}", path));
    }
    Ok(value)
}

fn mms_path(rest: &str) -> String {
    format!("/icd/release/11/{}/mms/{}", RELEASE_PLACEHOLDER, rest)
}

/// autocode <text>: best matching ICD-11 code for free text.
pub fn autocode<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    let search = args.text(0)?;
    let found = fetch(session, &mms_path(&format!("autocode?searchText={}", query_escape(search))))?;

    let out = session.out();
    match found.get("theCode").and_then(Value::as_str) {
        Some(code) => {
            writeln!(out, "code:  {}", code)?;
            if let Some(matched) = text(&found, "matchingText") {
                writeln!(out, "match: {}", matched)?;
            }
            if let Some(score) = found.get("matchScore") {
                writeln!(out, "score: {}", score)?;
            }
        }
        None => writeln!(out, "no code found for '{}'", search)?,
    }
    Ok(())
}

/// id <ids...>: title and definition of foundation entities.
pub fn id<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    let ids = args.texts(0)?;
    if ids.is_empty() {
        bail!("no entity id given");
    }

    for entity_id in ids {
        let entity = fetch(session, &format!("/icd/entity/{}", entity_id))?;
        write_entity(session, entity_id, &entity)?;
    }
    Ok(())
}

/// lookup <code>: the MMS entity behind an ICD-11 code.
pub fn lookup<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    let code = args.text(0)?;
    let info = fetch(
        session,
        &mms_path(&format!("codeinfo/{}?flexiblemode=true", query_escape(code))),
    )?;
    let stem = info
        .get("stemId")
        .and_then(Value::as_str)
        .with_context(|| format!("no entity for code {}", code))?;
    let entity = fetch(session, stem)?;

    let label = text(&info, "code").unwrap_or(code).to_string();
    write_entity(session, &label, &entity)
}

fn write_entity<T: Transport>(session: &mut Session<T>, label: &str, entity: &Value) -> Result<()> {
    let out = session.out();
    writeln!(out, "{}: {}", label, text(entity, "title").unwrap_or("(untitled)"))?;
    if let Some(definition) = text(entity, "definition") {
        writeln!(out, "    {}", definition)?;
    }
    Ok(())
}

/// search <text>: ICD-11 codes and titles matching free text.
pub fn search<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    let query = args.text(0)?;
    let found = fetch(
        session,
        &mms_path(&format!("search?q={}&flatResults=true", query_escape(query))),
    )?;
    let hits = found
        .get("destinationEntities")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let out = session.out();
    if hits.is_empty() {
        writeln!(out, "no results for '{}'", query)?;
    }
    for hit in hits {
        let code = text(hit, "theCode").filter(|c| !c.is_empty()).unwrap_or("-");
        let title = text(hit, "title").map(strip_tags).unwrap_or_default();
        writeln!(out, "{}\t{}", code, title)?;
    }
    Ok(())
}

/// release: the release in use and every published one.
pub fn release<T: Transport>(session: &mut Session<T>, _args: &Args) -> Result<()> {
    let current = session.api()?.release_id()?;
    let index = fetch(session, RELEASE_INDEX_PATH)?;

    let out = session.out();
    writeln!(out, "current: {}", current)?;
    let available = index.get("release").and_then(Value::as_array).into_iter().flatten();
    for uri in available.filter_map(Value::as_str) {
        if let Some(release) = extract_release_id(uri) {
            writeln!(out, "  {}", release)?;
        }
    }
    Ok(())
}

/// call <uri>: raw API request, printed as JSON.
pub fn call<T: Transport>(session: &mut Session<T>, args: &Args) -> Result<()> {
    let value = fetch(session, args.text(0)?)?;
    writeln!(session.out(), "{}", serde_json::to_string_pretty(&value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, list, run, texts};

    #[test]
    fn autocode_prints_code_match_and_score() {
        let script = Script::new().reply(
            200,
            r#"{"searchText":"cholera","matchingText":"Cholera","theCode":"1A00","matchScore":1}"#,
        );
        let (result, output, urls) = run(&script, autocode, texts(&["cholera due to vibrio"]));

        result.unwrap();
        assert_eq!(output, "code:  1A00\nmatch: Cholera\nscore: 1\n");
        assert_eq!(
            urls,
            vec!["https://id.who.int/icd/release/11/2024-01/mms/autocode?searchText=cholera+due+to+vibrio"]
        );
    }

    #[test]
    fn autocode_without_a_code() {
        let script = Script::new().reply(200, r#"{"searchText":"zzz","theCode":null}"#);
        let (result, output, _) = run(&script, autocode, texts(&["zzz"]));
        result.unwrap();
        assert_eq!(output, "no code found for 'zzz'\n");
    }

    #[test]
    fn id_prints_every_entity() {
        let script = Script::new()
            .reply(
                200,
                r#"{"title":{"@language":"en","@value":"Cholera"},"definition":{"@language":"en","@value":"An infection."}}"#,
            )
            .reply(200, r#"{"title":{"@language":"en","@value":"Typhoid fever"}}"#);
        let (result, output, urls) = run(&script, id, list(&["257068234", "1376951734"]));

        result.unwrap();
        assert_eq!(output, "257068234: Cholera\n    An infection.\n1376951734: Typhoid fever\n");
        assert_eq!(
            urls,
            vec![
                "https://id.who.int/icd/entity/257068234",
                "https://id.who.int/icd/entity/1376951734"
            ]
        );
    }

    #[test]
    fn id_needs_at_least_one_id() {
        let (result, _, urls) = run(&Script::new(), id, list(&[]));
        assert!(result.is_err());
        assert!(urls.is_empty());
    }

    #[test]
    fn remote_errors_are_fatal_with_status_and_detail() {
        let script = Script::new().reply(404, "No entity with id 1");
        let (result, output, _) = run(&script, id, list(&["1"]));

        let err = result.unwrap_err();
        let remote = err.downcast_ref::<icd_api::RemoteError>().unwrap();
        assert_eq!(remote.status_code, 404);
        assert_eq!(remote.detail, "No entity with id 1");
        assert!(output.is_empty());
    }

    #[test]
    fn lookup_follows_the_stem_entity() {
        let script = Script::new()
            .reply(
                200,
                r#"{"code":"1A00","stemId":"http://id.who.int/icd/release/11/2024-01/mms/257068234"}"#,
            )
            .reply(200, r#"{"title":{"@language":"en","@value":"Cholera"}}"#);
        let (result, output, urls) = run(&script, lookup, texts(&["1a00"]));

        result.unwrap();
        assert_eq!(output, "1A00: Cholera\n");
        assert_eq!(
            urls,
            vec![
                "https://id.who.int/icd/release/11/2024-01/mms/codeinfo/1a00?flexiblemode=true",
                "https://id.who.int/icd/release/11/2024-01/mms/257068234",
            ]
        );
    }

    #[test]
    fn search_lists_codes_without_highlighting() {
        let script = Script::new().reply(
            200,
            r#"{"error":false,"destinationEntities":[
                {"theCode":"1A00","title":"<em class='found'>Cholera</em>"},
                {"theCode":"","title":"<em class='found'>Cholera</em> vaccine"}
            ]}"#,
        );
        let (result, output, _) = run(&script, search, texts(&["cholera"]));

        result.unwrap();
        assert_eq!(output, "1A00\tCholera\n-\tCholera vaccine\n");
    }

    #[test]
    fn search_without_hits() {
        let script = Script::new().reply(200, r#"{"error":false,"destinationEntities":[]}"#);
        let (result, output, _) = run(&script, search, texts(&["qqq"]));
        result.unwrap();
        assert_eq!(output, "no results for 'qqq'\n");
    }

    #[test]
    fn release_lists_published_releases() {
        let script = Script::new().reply(
            200,
            r#"{"latestRelease":"http://id.who.int/icd/release/11/2024-01/mms",
                "release":["http://id.who.int/icd/release/11/2023-01/mms",
                           "http://id.who.int/icd/release/11/2024-01/mms"]}"#,
        );
        let (result, output, _) = run(&script, release, texts(&[]));

        result.unwrap();
        assert_eq!(output, "current: 2024-01\n  2023-01\n  2024-01\n");
    }

    #[test]
    fn call_pretty_prints_json() {
        let script = Script::new().reply(200, r#"{"a":1}"#);
        let (result, output, urls) = run(&script, call, texts(&["http://id.who.int/icd/entity"]));

        result.unwrap();
        assert_eq!(output, "{\n  \"a\": 1\n}\n");
        assert_eq!(urls, vec!["https://id.who.int/icd/entity"]);
    }
}
