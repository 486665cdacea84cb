/// Index settings and mappings
use crate::embedding::DEFAULT_DIMENSION;
use crate::records::RecordKind;
use serde_json::{json, Map, Value};

/// Part-of-speech tags dropped by the Korean analyzer (endings, particles,
/// symbols, affixes and the like)
pub const DEFAULT_STOPTAGS: [&str; 17] = [
    "E", "IC", "J", "MAG", "MM", "SP", "SSC", "SSO", "SC", "SE", "XPN", "XSA", "XSN", "XSV",
    "UNA", "NA", "VSV",
];

/// Custom analyzer shared by every lexical field
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub name: String,
    pub tokenizer: String,
    pub decompound_mode: String,
    pub stoptags: Vec<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            name: "korean_analyzer".to_string(),
            tokenizer: "nori_tokenizer".to_string(),
            decompound_mode: "mixed".to_string(),
            stoptags: DEFAULT_STOPTAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// ANN method of the vector field
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMethod {
    pub name: String,
    pub engine: String,
    pub space_type: String,
    pub ef_construction: u32,
    pub m: u32,
}

impl Default for VectorMethod {
    fn default() -> Self {
        Self {
            name: "hnsw".to_string(),
            engine: "nmslib".to_string(),
            space_type: "cosinesimil".to_string(),
            ef_construction: 128,
            m: 24,
        }
    }
}

/// Everything needed to create one index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: RecordKind,
    pub dimension: usize,
    pub shards: u32,
    pub replicas: u32,
    pub ef_search: u32,
    pub analyzer: AnalyzerSettings,
    pub method: VectorMethod,
}

impl IndexDescriptor {
    /// Descriptor with default analysis and vector settings
    pub fn for_kind(kind: RecordKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            dimension: DEFAULT_DIMENSION,
            shards: 1,
            replicas: 0,
            ef_search: 100,
            analyzer: AnalyzerSettings::default(),
            method: VectorMethod::default(),
        }
    }

    /// Body for `PUT /{index}`
    pub fn to_create_body(&self) -> Value {
        let analyzer = &self.analyzer;
        json!({
            "settings": {
                "index": {
                    "knn": true,
                    "knn.algo_param.ef_search": self.ef_search,
                    "knn.space_type": self.method.space_type,
                },
                "number_of_shards": self.shards,
                "number_of_replicas": self.replicas,
                "analysis": {
                    "analyzer": {
                        analyzer.name.clone(): {
                            "type": "custom",
                            "tokenizer": analyzer.tokenizer,
                            "filter": ["lowercase", "nori_part_of_speech"],
                        }
                    },
                    "tokenizer": {
                        analyzer.tokenizer.clone(): {
                            "type": "nori_tokenizer",
                            "decompound_mode": analyzer.decompound_mode,
                        }
                    },
                    "filter": {
                        "nori_part_of_speech": {
                            "type": "nori_part_of_speech",
                            "stoptags": analyzer.stoptags,
                        }
                    }
                }
            },
            "mappings": {
                "properties": self.properties(),
            }
        })
    }

    fn properties(&self) -> Value {
        let text = json!({"type": "text", "analyzer": self.analyzer.name});
        let keyword = json!({"type": "keyword"});

        let mut props = Map::new();
        match self.kind {
            RecordKind::Ingredient => {
                props.insert("ingredient_id".into(), json!({"type": "long"}));
                props.insert("name".into(), text.clone());
                props.insert("aliases".into(), text.clone());
                props.insert("category".into(), keyword);
            }
            RecordKind::Recipe => {
                props.insert("recipe_id".into(), keyword.clone());
                props.insert("name".into(), text.clone());
                props.insert("ingredients".into(), text.clone());
                props.insert("category".into(), keyword.clone());
                props.insert("cooking_method".into(), keyword);
                props.insert("hashtag".into(), text.clone());
            }
        }
        props.insert(
            "embedding".into(),
            json!({
                "type": "knn_vector",
                "dimension": self.dimension,
                "method": {
                    "name": self.method.name,
                    "space_type": self.method.space_type,
                    "engine": self.method.engine,
                    "parameters": {
                        "ef_construction": self.method.ef_construction,
                        "m": self.method.m,
                    }
                }
            }),
        );
        props.insert("embedding_text".into(), json!({"type": "text"}));
        props.insert("created_at".into(), json!({"type": "date"}));
        Value::Object(props)
    }
}
