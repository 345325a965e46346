//! Prompt templates for each generation step.
//!
//! Every template ends with the JSON shape the step expects back; the request input
//! is appended by the generator as `INPUT = {json}`.

use super::PromptKind;

const SKELETON: &str = r#"You design personalised learning roadmaps.

Using the learner profile in INPUT (skillName, goal, currentSkillLevel,
desiredSkillLevel, estimatedLearningDuration, dailyTime), lay out a roadmap that
moves the learner from their current level to the desired level and ends with the
goal achieved. Each phase builds on the previous one.

Rules:
- title names the skill; do not include the words "learning path".
- description summarises what the phases cover in at most three sentences.
- imageURL links to a suitable cover image.
- at least 2 phases; at least 3 topics per phase.
- every topic has 4-5 outline points and a topicSearchTerm: a concise query that
  finds good tutorials and videos for that topic.

Respond with JSON only:
{"title": string,
 "description": string,
 "imageURL": string,
 "phases": [{
   "phaseDescription": string,
   "topics": [{
     "topicName": string,
     "topicSearchTerm": string,
     "topicOutline": [string]
   }]
 }]}"#;

const INFO_BITS: &str = r#"You write short lessons called infobits.

INPUT holds one phase of a roadmap plus the learner profile. For every topic in the
phase write 4-5 infobits that together cover the topic outline. An infobit is a
short explanatory text, up to 5 keywords taken from that text, and optionally an
example when one makes the text clearer. Keep phases and topics in the order given.

Respond with JSON only:
{"phases": [{
   "phaseDescription": string,
   "topics": [{
     "topicName": string,
     "infoBits": [{
       "text": string,
       "keywords": [string],
       "example": string (optional)
     }]
   }]
 }]}"#;

const PHASE_QUIZ: &str = r#"You write quiz questions for a learning roadmap.

INPUT holds one phase with its topics and infobits. Write exactly one question per
infobit, in the same order as the infobits, testing what that infobit teaches.
Match the difficulty to the learner's levels. Mix question types:
"multiple-choice" (with options), "true-false" and "short-answer".

Respond with JSON only:
{"topics": [{
   "topicName": string,
   "questions": [{
     "question": string,
     "type": "multiple-choice" | "true-false" | "short-answer",
     "options": [string],
     "answer": string
   }]
 }]}"#;

const FINAL_QUIZ: &str = r#"You write the final assessment for a learning roadmap.

INPUT lists every topic of the roadmap with its topicNumber and topicName. Write a
comprehensive quiz of 5-10 questions spanning the whole roadmap. Each question
names the topicNumber it assesses.

Respond with JSON only:
{"questions": [{
   "topicNumber": number,
   "question": string,
   "type": "multiple-choice" | "true-false" | "short-answer",
   "options": [string],
   "answer": string
 }]}"#;

pub fn template(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::Skeleton => SKELETON,
        PromptKind::InfoBits => INFO_BITS,
        PromptKind::PhaseQuiz => PHASE_QUIZ,
        PromptKind::FinalQuiz => FINAL_QUIZ,
    }
}
