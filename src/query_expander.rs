//! Expands a query with a static synonym table (spec.md §4.3).

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// ~180 domain terms mapped to space-separated expansion terms. Grounded on
/// the synonym-table shape used by the pack's `context-finder` query
/// expansion module, generalized to code-search vocabulary.
fn default_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        let entries: &[(&str, &str)] = &[
            ("auth", "authentication authorize authorization login logout session token"),
            ("authentication", "auth authorize login session credential"),
            ("authorize", "authorization permission access acl role"),
            ("login", "signin authenticate session credential"),
            ("logout", "signout session expire"),
            ("session", "token cookie state"),
            ("token", "jwt credential session key"),
            ("db", "database sql storage"),
            ("database", "db sql storage persistence"),
            ("sql", "query database table"),
            ("query", "search lookup fetch select"),
            ("storage", "database disk persistence"),
            ("table", "schema column row"),
            ("schema", "table model structure"),
            ("migration", "schema upgrade changeset"),
            ("orm", "database model mapper"),
            ("transaction", "commit rollback atomic"),
            ("api", "endpoint route service interface"),
            ("endpoint", "api route handler path"),
            ("route", "endpoint path url handler"),
            ("request", "call invoke http"),
            ("response", "reply result output"),
            ("rest", "api http json"),
            ("graphql", "api query schema resolver"),
            ("webhook", "callback event notification"),
            ("http", "https request network"),
            ("error", "exception failure bug fault"),
            ("exception", "error throw catch fault"),
            ("fail", "failure error crash"),
            ("failure", "error exception fault"),
            ("panic", "crash abort exception"),
            ("crash", "panic fail abort"),
            ("bug", "defect issue error"),
            ("throw", "raise exception error"),
            ("catch", "handle exception recover"),
            ("test", "spec unittest assertion coverage"),
            ("spec", "test specification behavior"),
            ("mock", "stub fake double"),
            ("fixture", "setup mock stub"),
            ("assert", "expect verify check"),
            ("unittest", "test spec assertion"),
            ("coverage", "test metric report"),
            ("config", "configuration setting option"),
            ("configuration", "config setting environment"),
            ("setting", "config option preference"),
            ("env", "environment variable configuration"),
            ("environment", "env config variable"),
            ("option", "setting flag parameter"),
            ("flag", "option switch toggle"),
            ("class", "struct type object"),
            ("struct", "class type record"),
            ("interface", "trait protocol contract"),
            ("trait", "interface protocol behavior"),
            ("object", "instance class entity"),
            ("instance", "object entity"),
            ("type", "class kind sort"),
            ("function", "method procedure routine"),
            ("method", "function procedure call"),
            ("call", "invoke execute run"),
            ("invoke", "call execute trigger"),
            ("implement", "build create write"),
            ("handler", "callback listener processor"),
            ("cache", "memoize store buffer"),
            ("queue", "buffer channel pipeline"),
            ("worker", "thread task job"),
            ("thread", "worker concurrency task"),
            ("async", "concurrent nonblocking await"),
            ("concurrency", "parallel thread async"),
            ("parallel", "concurrent thread simultaneous"),
            ("lock", "mutex semaphore guard"),
            ("mutex", "lock guard exclusive"),
            ("log", "logging trace record"),
            ("logging", "log trace diagnostic"),
            ("trace", "log debug diagnostic"),
            ("debug", "trace diagnostic inspect"),
            ("metric", "stat measurement telemetry"),
            ("telemetry", "metric monitoring observability"),
            ("monitor", "watch observe track"),
            ("serialize", "encode marshal format"),
            ("deserialize", "decode unmarshal parse"),
            ("parse", "decode read interpret"),
            ("encode", "serialize format convert"),
            ("decode", "deserialize parse convert"),
            ("validate", "check verify sanitize"),
            ("sanitize", "clean validate escape"),
            ("encrypt", "cipher secure encode"),
            ("decrypt", "cipher decode unlock"),
            ("hash", "digest checksum fingerprint"),
            ("checksum", "hash digest verify"),
            ("key", "credential secret token"),
            ("secret", "credential key password"),
            ("password", "credential secret auth"),
            ("permission", "access role authorize acl"),
            ("role", "permission access group"),
            ("acl", "permission access control"),
            ("middleware", "interceptor filter handler"),
            ("filter", "middleware predicate query"),
            ("pipeline", "workflow chain process"),
            ("workflow", "pipeline process flow"),
            ("scheduler", "cron timer job"),
            ("cron", "scheduler timer job"),
            ("job", "task worker process"),
            ("task", "job worker unit"),
            ("event", "signal notification message"),
            ("message", "event notification payload"),
            ("notification", "alert message event"),
            ("upload", "send transfer put"),
            ("download", "fetch retrieve get"),
            ("file", "document artifact asset"),
            ("directory", "folder path dir"),
            ("path", "route location directory"),
            ("stream", "pipe channel flow"),
            ("buffer", "cache queue memory"),
            ("memory", "ram heap allocation"),
            ("allocate", "reserve memory create"),
            ("free", "deallocate release cleanup"),
            ("cleanup", "dispose release free"),
            ("init", "initialize setup bootstrap"),
            ("initialize", "init setup bootstrap"),
            ("bootstrap", "init setup startup"),
            ("startup", "init bootstrap launch"),
            ("shutdown", "stop terminate close"),
            ("terminate", "stop kill shutdown"),
            ("retry", "backoff reattempt resilience"),
            ("timeout", "deadline expire limit"),
            ("deadline", "timeout limit expire"),
            ("rate", "throttle limit quota"),
            ("throttle", "rate limit quota"),
            ("limit", "quota cap threshold"),
            ("vector", "embedding similarity dense"),
            ("embedding", "vector dense representation"),
            ("similarity", "distance cosine relevance"),
            ("index", "catalog registry lookup"),
            ("search", "query find lookup retrieve"),
            ("rank", "score order sort"),
            ("score", "rank weight relevance"),
            ("chunk", "segment slice fragment"),
            ("parser", "lexer tokenizer compiler"),
            ("lexer", "tokenizer scanner parser"),
            ("tokenizer", "lexer scanner splitter"),
            ("compiler", "parser translator builder"),
            ("ast", "tree syntax node"),
            ("tree", "ast hierarchy structure"),
            ("node", "element vertex entry"),
            ("graph", "tree network structure"),
            ("socket", "connection network stream"),
            ("connection", "socket session link"),
            ("client", "consumer caller requester"),
            ("server", "host service backend"),
            ("service", "api server backend"),
            ("backend", "server service api"),
            ("frontend", "ui client view"),
            ("ui", "interface frontend view"),
            ("view", "render display ui"),
            ("render", "draw display paint"),
            ("component", "module widget element"),
            ("module", "package component unit"),
            ("package", "module library crate"),
            ("library", "package crate dependency"),
            ("dependency", "package library requirement"),
            ("plugin", "extension addon module"),
            ("extension", "plugin addon module"),
        ];
        for (k, v) in entries {
            m.insert(*k, *v);
        }
        m
    })
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct QueryExpanderConfig {
    pub enabled: bool,
    pub max_expansion_terms: usize,
    /// Overlaid onto the defaults — caller-supplied entries win on key clash.
    pub extra_terms: HashMap<String, String>,
}

impl Default for QueryExpanderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_expansion_terms: 10,
            extra_terms: HashMap::new(),
        }
    }
}

/// Expand `query` with synonym terms. No-op when disabled or blank.
pub fn expand(query: &str, config: &QueryExpanderConfig) -> String {
    if !config.enabled || query.trim().is_empty() {
        return query.to_string();
    }

    let original_words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
    let original_set: HashSet<&str> = original_words.iter().map(|s| s.as_str()).collect();

    let mut additions: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for word in &original_words {
        let expansion = config
            .extra_terms
            .get(word.as_str())
            .map(|s| s.as_str())
            .or_else(|| default_table().get(word.as_str()).copied());

        let Some(expansion) = expansion else { continue };

        for term in expansion.split_whitespace() {
            if original_set.contains(term) || seen.contains(term) {
                continue;
            }
            if additions.len() >= config.max_expansion_terms {
                break;
            }
            seen.insert(term.to_string());
            additions.push(term.to_string());
        }
    }

    if additions.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query, additions.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_query_expansion_scenario() {
        let expanded = expand("db query", &QueryExpanderConfig::default());
        assert!(expanded.contains("database"));
        assert!(expanded.contains("sql"));
        assert!(expanded.contains("storage"));
        assert!(expanded.contains("db"));
        assert!(expanded.contains("query"));
        let words: Vec<&str> = expanded.split_whitespace().collect();
        let unique: HashSet<&str> = words.iter().copied().collect();
        assert_eq!(words.len(), unique.len(), "expansion must not duplicate any token");
    }

    #[test]
    fn disabled_is_noop() {
        let cfg = QueryExpanderConfig { enabled: false, ..Default::default() };
        assert_eq!(expand("db query", &cfg), "db query");
    }

    #[test]
    fn blank_input_is_noop() {
        assert_eq!(expand("   ", &QueryExpanderConfig::default()), "   ");
    }

    #[test]
    fn caps_total_additions() {
        let cfg = QueryExpanderConfig { max_expansion_terms: 2, ..Default::default() };
        let expanded = expand("auth db error", &cfg);
        let original_len = "auth db error".split_whitespace().count();
        let added = expanded.split_whitespace().count() - original_len;
        assert!(added <= 2);
    }
}
