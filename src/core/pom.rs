//! Stamp the source revision into a Maven POM before deployment.
//!
//! The POM is edited as text so formatting and comments survive. Only the
//! `<properties>` block and its `<svnRevision>` child are touched.

use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::utils::io;

/// Open or self-closing tag. Names sharing the prefix (`<propertiesX>`) do not match.
const PROPERTIES_TAG: &str = r"<properties(?:[\s/][^>]*)?>";
const PROPERTIES_CLOSE: &str = r"</properties\s*>";
const SVN_REVISION_TAG: &str = r"<svnRevision(?:[\s/][^>]*)?>";
const SVN_REVISION_CLOSE: &str = r"</svnRevision\s*>";
const PROJECT_CLOSE: &str = r"</project\s*>";
/// Markup that holds no elements.
const INERT: &str = r"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>";

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::internal_unexpected(format!("pom pattern: {}", e)))
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Blank out comments and CDATA sections, keeping every byte offset.
fn mask_inert(content: &str) -> Result<String> {
    let mut bytes = content.as_bytes().to_vec();
    for m in regex(INERT)?.find_iter(content) {
        bytes[m.range()].fill(b' ');
    }
    String::from_utf8(bytes).map_err(|e| Error::internal_unexpected(format!("mask POM: {}", e)))
}

fn is_self_closing(tag: &str) -> bool {
    tag.ends_with("/>")
}

fn splice(content: &str, start: usize, end: usize, replacement: &str) -> String {
    format!("{}{}{}", &content[..start], replacement, &content[end..])
}

/// Return `content` with `<svnRevision>` set to `revision`.
///
/// Elements are counted the way a DOM sees them: self-closing tags count,
/// tags inside comments do not.
///
/// - no `<properties>`: a new block holding the revision is added to `<project>`
/// - one `<properties>` without `<svnRevision>`: the tag is added to it
/// - one of each: the tag's text is replaced
///
/// Any other shape is rejected and nothing is produced.
pub fn set_svn_revision(content: &str, revision: &str, path: &str) -> Result<String> {
    let masked = mask_inert(content)?;
    let revision = escape(revision);

    let properties: Vec<_> = regex(PROPERTIES_TAG)?.find_iter(&masked).collect();
    let revisions: Vec<_> = regex(SVN_REVISION_TAG)?.find_iter(&masked).collect();

    match (properties.as_slice(), revisions.as_slice()) {
        ([], _) => {
            let close = regex(PROJECT_CLOSE)?.find(&masked).ok_or_else(|| {
                Error::artifact_malformed(path, "no closing </project> element")
            })?;
            let block = format!(
                "  <properties>\n    <svnRevision>{}</svnRevision>\n  </properties>\n",
                revision
            );
            Ok(splice(content, close.start(), close.start(), &block))
        }
        ([open], []) if is_self_closing(open.as_str()) => {
            let block = format!(
                "<properties>\n    <svnRevision>{}</svnRevision>\n  </properties>",
                revision
            );
            Ok(splice(content, open.start(), open.end(), &block))
        }
        ([open], []) => {
            let close = regex(PROPERTIES_CLOSE)?
                .find_at(&masked, open.end())
                .ok_or_else(|| {
                    Error::artifact_malformed(path, "<properties> element is never closed")
                })?;
            let tag = format!("  <svnRevision>{}</svnRevision>\n  ", revision);
            Ok(splice(content, close.start(), close.start(), &tag))
        }
        ([_], [open]) if is_self_closing(open.as_str()) => {
            let tag = format!("<svnRevision>{}</svnRevision>", revision);
            Ok(splice(content, open.start(), open.end(), &tag))
        }
        ([_], [open]) => {
            let close = regex(SVN_REVISION_CLOSE)?
                .find_at(&masked, open.end())
                .ok_or_else(|| {
                    Error::artifact_malformed(path, "<svnRevision> element is never closed")
                })?;
            Ok(splice(content, open.end(), close.start(), &revision))
        }
        (p, r) => Err(Error::artifact_malformed(
            path,
            format!(
                "expected at most one <properties> and one <svnRevision>, found {} and {}",
                p.len(),
                r.len()
            ),
        )),
    }
}

/// Rewrite the POM file at `path` in place. The file is left untouched on error.
pub fn rewrite_svn_revision(path: &Path, revision: &str) -> Result<()> {
    let display = path.display().to_string();
    let content = io::read_file(path, "read POM").map_err(|e| {
        let problem = e.details["error"].as_str().unwrap_or("unreadable").to_string();
        Error::artifact_malformed(&display, problem)
    })?;

    let updated = set_svn_revision(&content, revision, &display)?;
    io::write_file_atomic(path, &updated, "write POM")?;

    log_status!("pom", "Set svnRevision {} in {}", revision, display);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = "<project>\n  <artifactId>portal</artifactId>\n</project>\n";

    #[test]
    fn adds_properties_block_when_absent() {
        let out = set_svn_revision(BARE, "1234", "pom.xml").unwrap();
        assert!(out.contains("<properties>\n    <svnRevision>1234</svnRevision>\n  </properties>\n</project>"));
        assert!(out.contains("<artifactId>portal</artifactId>"));
    }

    #[test]
    fn adds_revision_to_existing_properties() {
        let pom = "<project>\n  <properties>\n    <java.version>8</java.version>\n  </properties>\n</project>";
        let out = set_svn_revision(pom, "77", "pom.xml").unwrap();
        assert!(out.contains("<java.version>8</java.version>"));
        assert!(out.contains("<svnRevision>77</svnRevision>"));
        assert_eq!(out.matches("<properties>").count(), 1);
    }

    #[test]
    fn replaces_existing_revision() {
        let pom = "<project><properties><svnRevision>1</svnRevision></properties></project>";
        let out = set_svn_revision(pom, "2", "pom.xml").unwrap();
        assert_eq!(
            out,
            "<project><properties><svnRevision>2</svnRevision></properties></project>"
        );
    }

    #[test]
    fn rejects_multiple_properties_blocks() {
        let pom = "<project><properties/><properties></properties><properties></properties></project>";
        let err = set_svn_revision(pom, "2", "pom.xml").unwrap_err();
        assert_eq!(err.code.as_str(), "artifact.malformed");
    }

    #[test]
    fn rejects_duplicate_revision_tags() {
        let pom = "<project><properties><svnRevision>1</svnRevision><svnRevision>2</svnRevision></properties></project>";
        assert!(set_svn_revision(pom, "3", "pom.xml").is_err());
    }

    #[test]
    fn expands_self_closing_properties_in_place() {
        let pom = "<project>\n  <properties/>\n</project>\n";
        let out = set_svn_revision(pom, "42", "pom.xml").unwrap();
        assert_eq!(
            out,
            "<project>\n  <properties>\n    <svnRevision>42</svnRevision>\n  </properties>\n</project>\n"
        );
    }

    #[test]
    fn self_closing_properties_with_space_is_one_element() {
        let pom = "<project>\n  <properties />\n</project>\n";
        let out = set_svn_revision(pom, "42", "pom.xml").unwrap();
        assert_eq!(out.matches("<properties").count(), 1);
        assert!(out.contains("<svnRevision>42</svnRevision>"));
    }

    #[test]
    fn commented_out_properties_are_ignored() {
        let pom = "<project>\n  <!-- <properties><svnRevision>0</svnRevision></properties> -->\n  \
                   <properties>\n    <svnRevision>1</svnRevision>\n  </properties>\n</project>";
        let out = set_svn_revision(pom, "2", "pom.xml").unwrap();
        assert!(out.contains("<!-- <properties><svnRevision>0</svnRevision></properties> -->"));
        assert!(out.contains("<svnRevision>2</svnRevision>"));
        assert!(!out.contains("<svnRevision>1</svnRevision>"));
    }

    #[test]
    fn comment_only_properties_count_as_absent() {
        let pom = "<project>\n  <!-- <properties></properties> -->\n</project>\n";
        let out = set_svn_revision(pom, "5", "pom.xml").unwrap();
        assert!(out.ends_with("  <properties>\n    <svnRevision>5</svnRevision>\n  </properties>\n</project>\n"));
    }

    #[test]
    fn expands_self_closing_revision() {
        let pom = "<project><properties><svnRevision /></properties></project>";
        let out = set_svn_revision(pom, "8", "pom.xml").unwrap();
        assert_eq!(
            out,
            "<project><properties><svnRevision>8</svnRevision></properties></project>"
        );
    }

    #[test]
    fn similarly_named_elements_are_not_counted() {
        let pom = "<project><propertiesFile>x</propertiesFile><properties></properties></project>";
        let out = set_svn_revision(pom, "3", "pom.xml").unwrap();
        assert!(out.contains("<propertiesFile>x</propertiesFile>"));
        assert!(out.contains("<svnRevision>3</svnRevision>"));
    }

    #[test]
    fn escapes_revision_text() {
        let pom = "<project><properties><svnRevision>1</svnRevision></properties></project>";
        let out = set_svn_revision(pom, "a<b", "pom.xml").unwrap();
        assert!(out.contains("<svnRevision>a&lt;b</svnRevision>"));
    }

    #[test]
    fn malformed_file_is_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pom.xml");
        let pom = "<project><properties></properties><properties></properties></project>";
        std::fs::write(&path, pom).unwrap();

        assert!(rewrite_svn_revision(&path, "9").is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), pom);
    }

    #[test]
    fn rewrite_updates_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pom.xml");
        std::fs::write(&path, BARE).unwrap();

        rewrite_svn_revision(&path, "501").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<svnRevision>501</svnRevision>"));
    }

    #[test]
    fn missing_file_is_malformed_artifact() {
        let err = rewrite_svn_revision(Path::new("/nonexistent/pom.xml"), "1").unwrap_err();
        assert_eq!(err.code.as_str(), "artifact.malformed");
    }
}
