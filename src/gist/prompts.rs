/// Ask for a natural break among the numbered labels of a passage.
///
/// `preceding` is the previous page (or empty), `passage` the labeled window,
/// `following` the start of the paragraph after the window (or empty).
pub fn pagination(preceding: &str, passage: &str, following: &str) -> String {
    format!(
        r#"
You are given a passage taken from a longer text (an article, a book, ...) with numbered labels placed between some of its paragraphs.
Labels are written in angle brackets: label 19 appears in the text as <19>.
Choose the one label where it is most natural to pause reading.
Good pause points are scene transitions, the end of a dialogue, the end of an argument, a narrative transition, and so on.
Answer with the break point label and explain your choice.
For example, if <57> is a good place to break, answer "Break point: <57>
 Because ..."

Passage:

{preceding}
{passage}
{following}
"#
    )
}

/// Ask for a condensed version of one page.
pub fn shorten(page_text: &str) -> String {
    format!(
        r#"
Please shorten the following passage.
Only give me the shortened version. DO NOT explain your reasoning.

Passage:
{page_text}
"#
    )
}

/// Ask which pages to re-read before answering.
pub fn lookup(gists: &str, question: &str, max_pages: usize) -> String {
    format!(
        r#"
The following text is what you remember from reading an article, followed by a question about it.
You may read up to {max_pages} page(s) of the article again to refresh your memory before answering.
Please respond with which page(s) you would like to read.
For example, if you only need to read Page 8, respond with "I want to look up Page [8] to ...";
if you would like to read Page 7 and 12, respond with "I want to look up Page [7, 12] to ...";
if you would like to read Page 2, 3, 7, 15 and 18, respond with "I want to look up Page [2, 3, 7, 15, 18] to ...";
if you would like to read Page 3, 4, 5, 12, 13 and 16, respond with "I want to look up Page [3, 4, 5, 12, 13, 16] to ...".
If the text above is already enough, respond with "I want to look up Page [] ...".
DO NOT select more pages than you need.
DO NOT answer the question yet.

Text:
{gists}

Question:
{question}

Take a deep breath and tell me: Which page(s) would you like to read again?
"#
    )
}

/// Final answer over the expanded article.
pub fn answer(article: &str, question: &str) -> String {
    format!(
        r#"
Read the following article and then answer the question.

Article:
{article}

Question:
{question}
"#
    )
}
