//! Fixed instruction templates for every model call the engine makes.
//!
//! Placeholders are `{name}` and are filled with [`fill`]; braces that are not
//! a known placeholder are left untouched, so JSON examples need no escaping.

/// Plain extraction: a list of entity strings.
pub const EXTRACTION_PLAIN: &str = r#"
作为信息提取专家，你正在从用户的问询文本中提取图谱的信息实体。
根据下面用户问询的文本。限定输出格式为 List[str] 提取Web领域图谱可能涉及的实体。

**示例**
input: JS的DOM元素操作怎么和HTML的h1标签使用？
output: ['JS DOM', 'HTML h1']

**输入**
input: {question}
output:
"#;

/// Weighted extraction: entity strings may carry a `^N` importance suffix.
pub const EXTRACTION_WEIGHTED: &str = r#"
作为信息提取专家，你正在从用户的问询文本中提取图谱的信息实体。
根据下面用户问询的文本。限定输出格式为 List[str] 提取Web领域图谱可能涉及的实体。
通过符号`^`后加数字,我们可以进一步表征不同实体的重要性。重要性默认为1，且无需显示^符号

**示例**
input: JS的DOM元素操作怎么和HTML的h1标签使用？
说明：'JS的DOM元素'表示一个实体，'HTML的h1标签'表示另一个实体。我们给修饰词赋予1的重要性，名词性的表述为2。
output: ['JS DOM^2', 'HTML h1^2']

**注意**
接下来给出实际输入，请直接以数组形式输出，不要输出其他内容。

**输入**
input: {question}
output:
"#;

/// Next-step decision over the accumulated context.
pub const DECISION: &str = r#"
**任务背景**
你是一个智能决策系统，负责根据当前处理的问询和已获取的上下文信息，决定下一步操作。用户的目标是通过多步推理和上下文搜索来生成一个准确的答案。当前，你已经提取了以下实体，并且进行了初步的上下文搜索。现在，你需要决定下一步的操作步骤。

**上下文信息**
1. 用户提问: {question}
2. 已检索的实体关键词: {entities}
3. 已检索到的上下文信息:
{contexts}

**决策任务**
根据当前的上下文信息和提取的实体，判断下一步操作，并给出简短的解释。你可以在以下三种操作中选择一个最适合当前情况的步骤：
1. **执行多跳搜索**：需要额外的多跳搜索。基于上下文信息中的邻居关系作为参数，搜索邻居节点以获取更多信息。
2. **重新进行结构化搜索**：需要重新修改提取的实体表达（例如修正实体重要性），然后再次进行结构化搜索，以获取更相关的上下文。
3. **生成答案并结束**：已具备足够的上下文信息，可以生成最终答案，并结束流程。

**输出格式**
- 操作选择: <选择操作1、2或3>
- 操作理由: <简要说明为什么选择这个操作>
- 操作参数: <与所选操作相关的参数>

**示例1**
- 操作选择: 1
- 操作理由: 当前的上下文信息不完整，需要进一步探索相关节点的信息。
- 操作参数: ['邻居节点A', '邻居节点B']

**示例2**
- 操作选择: 2
- 操作理由: 原本检索user-adjustable element size无结果，可以通过^重新调整实体表达的权重，且更换相似近义词扩大搜索范围。
- 操作参数: ['element size^2','resizable']

**示例3**
- 操作选择: 3
- 操作理由: 当前的上下文信息已经完整，可直接生成回复。
- 操作参数: []

**实际输入**
- 操作选择:
- 操作理由:
- 操作参数:

"#;

/// Second-chance prompt: restate a decision as a three-key JSON object.
pub const JSON_REFORMAT: &str = r#"
**提示**
将以下内容转为JSON格式，其中包括三个键:'operation'、'reason' 和 'parameters'。
operation的值为整数:'1'、'2'或者'3'。reason的值为字符串，parameters的值是一个列表，若无参数，则为空列表。直接输出对应JSON结果即可。

**内容**
{decision_result}

**格式**
{
  "operation": <操作编号>,
  "reason": "<选择理由>",
  "parameters": <操作参数>
}
"#;

/// System instruction for duplicate adjudication.
pub const RESOLUTION_SYSTEM: &str = "You are a data processing assistant. Your task is to identify duplicate entities in a list and decide which of them should be merged.
The entities might be slightly different in format or content, but essentially refer to the same thing. Use your analytical skills to determine duplicates.

Here are the rules for identifying duplicates:
1. Entities with minor typographical differences should be considered duplicates.
2. Entities with different formats but the same content should be considered duplicates.
3. Entities that refer to the same real-world object or concept, even if described differently, should be considered duplicates.
4. If it refers to different numbers, dates, or products, do not merge results
";

pub const RESOLUTION_USER: &str = r#"
Here is the list of entities to process:
{entities}

Please identify duplicates, merge them, and provide the merged list as a JSON object with a key `merge_entities` whose value is a list of lists of entity strings.
"#;

/// Answer synthesis with a domain topic.
pub const ANSWER: &str = r#"
作为一名 {role}，你将根据以下上下文和领域主题来回答用户的问题。

============
## 领域主题
{topic}
============
## 上下文
{context}
============
## 问题
{question}
============
请提供准确的答案，并确保在回答中涵盖相关的领域知识和背景信息。如有URL链接、日期等内容，注意保持完整。
输出语言与用户提出的`问题`语言保持一致 (English or Chinese)

**输出**
"#;

/// Answer synthesis for evaluation runs: no topic, explicit output language.
pub const ANSWER_EVAL: &str = r#"
作为一名 {role}，你将根据上下文来回答用户的问题。

============
## 上下文
{context}
============
## 问题
{question}
============
请提供准确的答案，并确保在回答中涵盖相关的领域知识和背景信息。如有URL链接、日期等内容，注意保持完整。
输出语言与用户提出的`问题`语言{language}保持一致

**输出**
"#;

/// Substitute `{name}` placeholders in one pass.
///
/// Values are never rescanned, so text containing `{question}` cannot inject
/// into a later placeholder.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_known_placeholders() {
        let prompt = fill(EXTRACTION_WEIGHTED, &[("question", "如何实现前端圣杯布局？")]);
        assert!(prompt.contains("input: 如何实现前端圣杯布局？"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_fill_keeps_json_braces() {
        let prompt = fill(JSON_REFORMAT, &[("decision_result", "- 操作选择: 3")]);
        assert!(prompt.contains("\"operation\": <操作编号>"));
        assert!(prompt.contains("{\n  \"operation\""));
        assert!(prompt.contains("- 操作选择: 3"));
    }

    #[test]
    fn test_fill_does_not_rescan_values() {
        let out = fill("{a} {b}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "{b} x");
    }

    #[test]
    fn test_decision_template_lists_three_operations() {
        for label in ["操作选择:", "操作理由:", "操作参数:"] {
            assert!(DECISION.contains(label));
        }
        assert!(DECISION.contains("1. **执行多跳搜索**"));
        assert!(DECISION.contains("3. **生成答案并结束**"));
    }
}
