//! 翻译引擎核心实现
//!
//! 负责把一个 JSON 文档完整地翻译为目标语言，同时保持结构和内嵌 HTML 不变。
//!
//! ## 工作流程
//! 1. 遍历文档，提取所有字符串叶子
//! 2. 含 HTML 的叶子拆成模板与纯文本片段
//! 3. 长片段按句子切分
//! 4. 对全文档去重后的句子集合查询缓存
//! 5. 只把未命中的句子分批送往翻译服务，并写回缓存
//! 6. 依次还原句子 → 片段 → 叶子
//! 7. 执行长度约束，再写回文档副本
//!
//! 各阶段在同一任务内顺序执行。缓存读写失败只降级为告警，不影响翻译结果；
//! 翻译服务失败则使本次执行失败。
//!
//! ## 使用示例
//! ```ignore
//! let engine = TranslationEngine::new(provider, cache, None, &PipelineConfig::default());
//! let output = engine.run(&job).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexSet;
use serde_json::Value;

use super::provider::{TextShortener, TranslationProvider};
use crate::jobs::model::{JobOutput, TranslationJob};
use crate::translation::config::PipelineConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::batch::BatchTranslator;
use crate::translation::pipeline::length::LengthEnforcer;
use crate::translation::pipeline::markup::{HtmlMap, MarkupSplitter};
use crate::translation::pipeline::segmenter::Segmenter;
use crate::translation::pipeline::walker::{self, StringNode};
use crate::translation::storage::{CacheStats, TranslationCache};

/// 单个文档的翻译参数
#[derive(Debug, Clone, Copy)]
pub struct DocumentRequest<'a> {
    pub document: &'a Value,
    pub source_lang: Option<&'a str>,
    pub target_lang: &'a str,
    pub glossary_id: Option<&'a str>,
    pub constraints: &'a BTreeMap<String, usize>,
}

impl<'a> DocumentRequest<'a> {
    pub fn for_job(job: &'a TranslationJob) -> Self {
        Self {
            document: &job.input_json,
            source_lang: job.source_lang.as_deref(),
            target_lang: &job.target_lang,
            glossary_id: job.glossary_id.as_deref(),
            constraints: &job.constraints,
        }
    }
}

/// 叶子的拆分结果
struct LeafPlan {
    node: StringNode,
    map: HtmlMap,
    /// 每个片段切出的句子
    segments: Vec<Vec<String>>,
}

/// 翻译引擎
///
/// 引擎本身无状态，可在多个工作任务之间通过 `Arc` 共享。
pub struct TranslationEngine {
    splitter: MarkupSplitter,
    segmenter: Segmenter,
    cache: Arc<TranslationCache>,
    translator: BatchTranslator,
    enforcer: LengthEnforcer,
    stats: EngineStats,
}

impl TranslationEngine {
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        cache: Arc<TranslationCache>,
        shortener: Option<Arc<dyn TextShortener>>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            splitter: MarkupSplitter::default(),
            segmenter: Segmenter::new(config.segment_threshold),
            cache,
            translator: BatchTranslator::new(provider, config.batch_size),
            enforcer: LengthEnforcer::new(shortener),
            stats: EngineStats::default(),
        }
    }

    /// 替换标记拆分器（例如使用自定义的标签分类）
    pub fn with_splitter(mut self, splitter: MarkupSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// 执行一个任务
    pub async fn run(&self, job: &TranslationJob) -> TranslationResult<JobOutput> {
        self.translate_document(DocumentRequest::for_job(job))
            .await
            .map_err(|e| e.with_context(format!("job {}", job.id)))
    }

    /// 翻译整个文档
    pub async fn translate_document(
        &self,
        request: DocumentRequest<'_>,
    ) -> TranslationResult<JobOutput> {
        let start = Instant::now();

        // 1-3. 提取并拆分
        let plans: Vec<LeafPlan> = walker::extract(request.document)
            .into_iter()
            .map(|node| self.plan_leaf(node))
            .collect();

        let distinct: IndexSet<String> = plans
            .iter()
            .flat_map(|plan| plan.segments.iter().flatten().cloned())
            .collect();
        let distinct: Vec<String> = distinct.into_iter().collect();

        // 4. 缓存查询
        let mut translations = self.lookup_cache(&distinct, &request).await;
        let cache_hits = translations.len();

        // 5. 翻译未命中的句子
        let misses: Vec<String> = distinct
            .iter()
            .filter(|segment| !translations.contains_key(*segment))
            .cloned()
            .collect();

        if !misses.is_empty() {
            let translated = self
                .translator
                .translate(
                    &misses,
                    request.source_lang,
                    request.target_lang,
                    request.glossary_id,
                )
                .await?;

            let pairs: Vec<(String, String)> = misses.into_iter().zip(translated).collect();
            self.save_cache(&pairs, &request).await;
            translations.extend(pairs);
        }

        // 6. 还原
        let mut nodes = plans
            .into_iter()
            .map(|plan| self.rebuild_leaf(plan, &translations))
            .collect::<TranslationResult<Vec<StringNode>>>()?;

        // 7. 长度约束并写回
        let adjusted = self
            .enforcer
            .enforce(&mut nodes, request.constraints, request.target_lang)
            .await;
        let output_json = walker::reconstruct(request.document, &nodes)?;

        self.stats.record(nodes.len(), distinct.len(), cache_hits);
        tracing::debug!(
            leaves = nodes.len(),
            segments = distinct.len(),
            cache_hits,
            adjusted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "文档翻译完成"
        );

        Ok(JobOutput {
            output_json,
            total_segments: distinct.len(),
            cache_hits,
        })
    }

    fn plan_leaf(&self, node: StringNode) -> LeafPlan {
        let map = self.splitter.split(&node.value);
        let segments = map
            .fragments
            .iter()
            .map(|fragment| self.segmenter.split(fragment))
            .collect();
        LeafPlan {
            node,
            map,
            segments,
        }
    }

    fn rebuild_leaf(
        &self,
        plan: LeafPlan,
        translations: &HashMap<String, String>,
    ) -> TranslationResult<StringNode> {
        let LeafPlan {
            node,
            map,
            segments,
        } = plan;

        let fragments = map
            .fragments
            .iter()
            .zip(&segments)
            .map(|(original, sentences)| {
                let translated = sentences
                    .iter()
                    .map(|sentence| {
                        translations.get(sentence).cloned().ok_or_else(|| {
                            TranslationError::InternalError(format!(
                                "句子缺少译文: {}",
                                node.path_string()
                            ))
                        })
                    })
                    .collect::<TranslationResult<Vec<String>>>()?;
                Ok(Segmenter::join(original, &translated))
            })
            .collect::<TranslationResult<Vec<String>>>()?;

        // 模板占位符与片段一一对应，否则还原结果会残留 `[i]`
        let expected = map.placeholder_count();
        if fragments.len() != expected {
            return Err(TranslationError::FragmentMismatch {
                path: node.path_string(),
                expected,
                actual: fragments.len(),
            });
        }

        Ok(StringNode {
            value: map.restore_with(&fragments),
            path: node.path,
        })
    }

    async fn lookup_cache(
        &self,
        segments: &[String],
        request: &DocumentRequest<'_>,
    ) -> HashMap<String, String> {
        if segments.is_empty() {
            return HashMap::new();
        }

        match self
            .cache
            .lookup(segments, request.source_lang, request.target_lang)
            .await
        {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!("缓存查询失败，按全部未命中处理: {}", error);
                HashMap::new()
            }
        }
    }

    async fn save_cache(&self, pairs: &[(String, String)], request: &DocumentRequest<'_>) {
        if let Err(error) = self
            .cache
            .save(pairs, request.source_lang, request.target_lang)
            .await
        {
            tracing::warn!("缓存写入失败，已跳过: {}", error);
        }
    }

    pub fn provider_name(&self) -> &str {
        self.translator.provider_name()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn get_stats(&self) -> &EngineStats {
        &self.stats
    }
}

/// 引擎运行统计
#[derive(Debug, Default)]
pub struct EngineStats {
    pub documents: AtomicUsize,
    pub leaves: AtomicUsize,
    pub segments: AtomicUsize,
    pub cache_hits: AtomicUsize,
}

impl EngineStats {
    fn record(&self, leaves: usize, segments: usize, cache_hits: usize) {
        self.documents.fetch_add(1, Ordering::Relaxed);
        self.leaves.fetch_add(leaves, Ordering::Relaxed);
        self.segments.fetch_add(segments, Ordering::Relaxed);
        self.cache_hits.fetch_add(cache_hits, Ordering::Relaxed);
    }

    pub fn get_documents(&self) -> usize {
        self.documents.load(Ordering::Relaxed)
    }
}
