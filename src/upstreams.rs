// Adapters from each upstream's payload shape to the types the API serves.
// Every function takes the normalized document and never fails: shapes that do not
// match produce an empty list, so schema drift shows up as missing data rather than a 500.

use crate::news::NewsItem;
use crate::text::{collate_pt_br, matches};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: u64,
    pub sigla: String,
    pub nome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    pub id: u64,
    pub nome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Senator {
    pub id: String,
    pub nome: String,
    pub cargo: String,
    pub partido: String,
    pub uf: String,
    pub foto: String,
}

// A single element where a list is expected is common in XML-derived documents
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        other => vec![other],
    }
}

// Text content of a node that may carry attributes, e.g. `<guid isPermaLink="false">x</guid>`
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get(crate::xml_tree::TEXT_KEY).and_then(text_of),
        _ => None,
    }
}

fn field_text(value: &Value, key: &str) -> String {
    value.get(key).and_then(text_of).unwrap_or_default()
}

fn typed_list<T: for<'de> Deserialize<'de>>(doc: &Value, source: &str) -> Vec<T> {
    as_list(doc)
        .into_iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(source, error = %e, "skipping unexpected entry");
                None
            }
        })
        .collect()
}

/// IBGE `/localidades/estados`, sorted by display name.
pub fn regions_from(doc: &Value) -> Vec<Region> {
    let mut regions: Vec<Region> = typed_list(doc, "ibge-estados");
    regions.sort_by(|a, b| collate_pt_br(&a.nome, &b.nome));
    regions
}

/// IBGE `/localidades/estados/{uf}/municipios`, sorted by display name.
pub fn municipalities_from(doc: &Value) -> Vec<Municipality> {
    let mut municipalities: Vec<Municipality> = typed_list(doc, "ibge-municipios");
    municipalities.sort_by(|a, b| collate_pt_br(&a.nome, &b.nome));
    municipalities
}

/// Câmara open-data envelope `{dados: [...], links: [...]}`; entries are passed through.
pub fn dados_from(doc: &Value) -> Vec<Value> {
    doc.get("dados")
        .map(|dados| as_list(dados).into_iter().cloned().collect())
        .unwrap_or_default()
}

/// RSS 2.0 `rss > channel > item`.
pub fn news_items_from(doc: &Value) -> Vec<NewsItem> {
    let items = doc
        .get("rss")
        .and_then(|rss| rss.get("channel"))
        .and_then(|channel| channel.get("item"))
        .map(as_list)
        .unwrap_or_default();

    items
        .into_iter()
        .map(|item| NewsItem {
            title: field_text(item, "title"),
            link: field_text(item, "link"),
            publication_date: field_text(item, "pubDate"),
            description: field_text(item, "description"),
        })
        .collect()
}

/// Senado `/senador/lista/atual`, optionally restricted to one state.
pub fn senators_from(doc: &Value, uf: Option<&str>) -> Vec<Senator> {
    let parlamentares = doc
        .get("ListaParlamentarEmExercicio")
        .and_then(|lista| lista.get("Parlamentares"))
        .and_then(|p| p.get("Parlamentar"))
        .map(as_list)
        .unwrap_or_default();

    let mut senators: Vec<Senator> = parlamentares
        .into_iter()
        .filter_map(|p| p.get("IdentificacaoParlamentar"))
        .map(|id| Senator {
            id: field_text(id, "CodigoParlamentar"),
            nome: field_text(id, "NomeParlamentar"),
            cargo: "Senador".to_string(),
            partido: field_text(id, "SiglaPartidoParlamentar"),
            uf: field_text(id, "UfParlamentar"),
            foto: field_text(id, "UrlFotoParlamentar"),
        })
        .filter(|s| uf.map_or(true, |uf| matches(&s.uf, uf)))
        .collect();

    senators.sort_by(|a, b| collate_pt_br(&a.nome, &b.nome));
    senators
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml_tree::parse_lenient;
    use serde_json::json;

    #[test]
    fn test_regions_are_trimmed_and_sorted() {
        let doc = json!([
            {"id": 35, "sigla": "SP", "nome": "São Paulo", "regiao": {"id": 3, "sigla": "SE"}},
            {"id": 12, "sigla": "AC", "nome": "Acre"},
            {"id": 16, "sigla": "AP", "nome": "Amapá"},
            {"id": 13, "sigla": "AM", "nome": "Amazonas"},
            {"id": 33, "sigla": "RJ", "nome": "Rio de Janeiro"}
        ]);

        let regions = regions_from(&doc);
        let names: Vec<&str> = regions.iter().map(|r| r.nome.as_str()).collect();
        assert_eq!(names, vec!["Acre", "Amapá", "Amazonas", "Rio de Janeiro", "São Paulo"]);
        assert_eq!(
            serde_json::to_value(&regions[4]).unwrap(),
            json!({"id": 35, "sigla": "SP", "nome": "São Paulo"})
        );
    }

    #[test]
    fn test_municipalities_sorted_with_accents() {
        let doc = json!([
            {"id": 3552809, "nome": "Taboão da Serra"},
            {"id": 3550308, "nome": "São Paulo"},
            {"id": 3500105, "nome": "Adamantina"},
            {"id": 3500204, "nome": "Águas de Lindóia"}
        ]);

        let names: Vec<String> = municipalities_from(&doc).into_iter().map(|m| m.nome).collect();
        assert_eq!(
            names,
            vec!["Adamantina", "Águas de Lindóia", "São Paulo", "Taboão da Serra"]
        );
    }

    #[test]
    fn test_unexpected_shapes_yield_empty_lists() {
        assert!(regions_from(&json!({"erro": "x"})).is_empty());
        assert!(municipalities_from(&json!(null)).is_empty());
        assert!(dados_from(&json!([1, 2])).is_empty());
        assert!(news_items_from(&json!({"feed": {}})).is_empty());
        assert!(senators_from(&json!("texto"), None).is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let doc = json!([{"id": 35, "sigla": "SP", "nome": "São Paulo"}, {"id": "x"}]);
        assert_eq!(regions_from(&doc).len(), 1);
    }

    #[test]
    fn test_dados_unwrapped() {
        let doc = json!({
            "dados": [{"id": 204554, "nome": "Fulano", "siglaUf": "SP"}],
            "links": [{"rel": "self"}]
        });
        assert_eq!(dados_from(&doc), vec![json!({"id": 204554, "nome": "Fulano", "siglaUf": "SP"})]);
    }

    #[test]
    fn test_news_items_from_single_and_repeated_items() {
        let single = parse_lenient(
            "<rss><channel><item><title>Um</title><link>l</link><pubDate>d</pubDate></item></channel></rss>",
        )
        .unwrap();
        let items = news_items_from(&single);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Um");
        assert_eq!(items[0].description, "");

        let repeated = parse_lenient(
            "<rss><channel><item><title>A</title></item><item><title>B</title></item></channel></rss>",
        )
        .unwrap();
        let titles: Vec<String> = news_items_from(&repeated).into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_news_item_text_with_attributes() {
        let doc = parse_lenient(
            r#"<rss><channel><item><title type="html">Título</title></item></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(news_items_from(&doc)[0].title, "Título");
    }

    #[test]
    fn test_senators_from_open_data_xml() {
        let doc = parse_lenient(
            r#"<ListaParlamentarEmExercicio>
                 <Parlamentares>
                   <Parlamentar>
                     <IdentificacaoParlamentar>
                       <CodigoParlamentar>5012</CodigoParlamentar>
                       <NomeParlamentar>Zélia Maria</NomeParlamentar>
                       <UrlFotoParlamentar>http://senado/5012.jpg</UrlFotoParlamentar>
                       <SiglaPartidoParlamentar>PT</SiglaPartidoParlamentar>
                       <UfParlamentar>SP</UfParlamentar>
                     </IdentificacaoParlamentar>
                   </Parlamentar>
                   <Parlamentar>
                     <IdentificacaoParlamentar>
                       <CodigoParlamentar>4981</CodigoParlamentar>
                       <NomeParlamentar>Álvaro Dias</NomeParlamentar>
                       <SiglaPartidoParlamentar>PODE</SiglaPartidoParlamentar>
                       <UfParlamentar>PR</UfParlamentar>
                     </IdentificacaoParlamentar>
                   </Parlamentar>
                 </Parlamentares>
               </ListaParlamentarEmExercicio>"#,
        )
        .unwrap();

        let all = senators_from(&doc, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].nome, "Álvaro Dias");
        assert_eq!(all[0].foto, "");

        assert_eq!(senators_from(&doc, Some(" pr "))[0].id, "4981");
        let sp = senators_from(&doc, Some("sp"));
        assert_eq!(
            sp,
            vec![Senator {
                id: "5012".to_string(),
                nome: "Zélia Maria".to_string(),
                cargo: "Senador".to_string(),
                partido: "PT".to_string(),
                uf: "SP".to_string(),
                foto: "http://senado/5012.jpg".to_string(),
            }]
        );
    }
}
