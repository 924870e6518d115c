/*!
 * Extraction tests over a realistic article page
 */

use pagetrans::errors::ExtractionError;
use pagetrans::extraction::{ExtractedDocument, extract_units};

const ARTICLE: &str = r#"
<article>
  <header>
    <h1>Getting started</h1>
    <p class="byline">Written by <a href="/team">the docs team</a></p>
  </header>
  <nav aria-hidden="true"><a href="/">Home</a></nav>
  <section>
    <h2>Install</h2>
    <p>Run the installer, then open a terminal:</p>
    <pre><code>pagetrans --help</code></pre>
    <ul>
      <li>Linux &amp; macOS</li>
      <li>Windows <em>(experimental)</em></li>
    </ul>
    <p class="notranslate">ACME Cloud&trade;</p>
    <table>
      <tr><th>Option</th><th>Meaning</th></tr>
      <tr><td><code>-t</code></td><td>Target language</td></tr>
    </table>
    <div style="display:none">Tracking pixel text</div>
    <p>First line<br>second line</p>
  </section>
  <script>window.analytics = {};</script>
</article>
"#;

fn texts(doc: &ExtractedDocument) -> Vec<(u32, &str)> {
    doc.units
        .iter()
        .map(|u| (u.number, u.text.as_str()))
        .collect()
}

#[test]
fn test_extractUnits_onArticle_shouldNumberTranslatableTextInOrder() {
    let doc = extract_units(ARTICLE, "Getting started guide").unwrap();

    assert_eq!(
        texts(&doc),
        vec![
            (0, "Getting started guide"),
            (1, "Getting started"),
            (2, "Written by the docs team"),
            (3, "Install"),
            (4, "Run the installer, then open a terminal:"),
            (5, "Linux & macOS"),
            (6, "Windows (experimental)"),
            (7, "Option"),
            (8, "Meaning"),
            (9, "Target language"),
            (10, "First line\nsecond line"),
        ]
    );
}

#[test]
fn test_extractUnits_onArticle_shouldLeaveSkippedRegionsUnnumbered() {
    let doc = extract_units(ARTICLE, "Guide").unwrap();

    assert!(doc.numbered_html.contains("<pre><code>pagetrans --help</code></pre>"));
    assert!(doc.numbered_html.contains("window.analytics = {};"));
    assert!(doc.numbered_html.contains(r#"<p class="notranslate">"#));
    assert!(!doc.units.iter().any(|u| u.text.contains("Home")));
    assert!(!doc.units.iter().any(|u| u.text.contains("Tracking")));
}

#[test]
fn test_extractUnits_onNumberedArticle_shouldReproduceSameUnits() {
    let first = extract_units(ARTICLE, "Guide").unwrap();
    let second = extract_units(&first.numbered_html, "Guide").unwrap();

    assert_eq!(first.units, second.units);
    assert_eq!(first.numbered_html, second.numbered_html);
}

#[test]
fn test_extractUnits_afterEdit_shouldKeepNumbersOfUntouchedUnits() {
    let first = extract_units(ARTICLE, "Guide").unwrap();
    let edited = first.numbered_html.replacen(
        "<h2",
        "<p>A new introduction paragraph</p><h2",
        1,
    );

    let second = extract_units(&edited, "Guide").unwrap();

    for unit in &first.units {
        assert!(second.units.contains(unit), "unit {} changed", unit.number);
    }
    let added: Vec<_> = second
        .units
        .iter()
        .filter(|u| !first.units.contains(u))
        .collect();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].text, "A new introduction paragraph");
    assert_eq!(added[0].number, 11);
}

#[test]
fn test_extractUnits_withOnlyMarkup_shouldReturnTitleOnly() {
    let doc = extract_units("<div><img src=\"a.png\"><hr></div>", "Gallery").unwrap();

    assert_eq!(texts(&doc), vec![(0, "Gallery")]);
}

#[test]
fn test_extractUnits_withBlankTitle_shouldFail() {
    assert_eq!(
        extract_units(ARTICLE, "\n\t "),
        Err(ExtractionError::EmptyTitle)
    );
}
