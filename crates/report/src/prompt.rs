//! Fixed instructions sent to the generative service

use crate::{AnalysisResult, Score};

/// Drowsiness/emotion instruction sent alongside the representative frame
pub const ANALYSIS_PROMPT: &str = "Analyze this image of a driver for:\n\
- Drowsiness (integer score from 0 = fully alert to 5 = asleep)\n\
- Emotional state (one label such as Calm, Happy, Stressed, Angry, Anxious, Sad)\n\
Do NOT analyze phone use, eating, smoking or other abnormal behaviors.\n\
Respond with raw JSON only, no extra text, exactly like:\n\
{\"drowsiness_score\": 0, \"emotional_state\": \"Calm\"}";

/// Elaboration instruction for the detected behaviors and the analyzer result
pub fn elaboration_prompt(detected_behaviors: &[String], analysis: &AnalysisResult) -> String {
    let behaviors = if detected_behaviors.is_empty() {
        "none".to_string()
    } else {
        detected_behaviors.join(", ")
    };
    let drowsiness = match analysis.drowsiness_score {
        Score::Value(v) => format!("{}/5", v),
        Score::NotAvailable => "unknown".to_string(),
    };

    format!(
        "Evaluate a driver's safety from the following observations of one drive.\n\n\
Detected behaviors (from an object detector, in order): {behaviors}\n\
Drowsiness score: {drowsiness}\n\
Emotional state: {emotion}\n\n\
Provide:\n\
1. Drowsiness analysis: signs of drowsiness and inattentiveness, with advice.\n\
2. Emotional state analysis: the driver's emotional state and its impact on driving.\n\
3. Abnormality analysis: risks of the detected behaviors and corrective advice.\n\
4. An overall safety score from 0 (dangerous) to 100 (exemplary) and actionable recommendations.\n\n\
Respond with a single JSON object matching this schema and nothing else:\n\
{{\n\
  \"drowsiness\": {{\"score\": <integer 0-5>, \"analysis\": [<string>, ...]}},\n\
  \"emotional_state\": {{\"score\": <integer 0-5>, \"analysis\": [<string>, ...]}},\n\
  \"abnormality\": {{\"score\": <integer 0-5>, \"analysis\": [<string>, ...]}},\n\
  \"overall_score\": <integer 0-100>,\n\
  \"recommendations\": [<string>, ...]\n\
}}\n\
The first emotional_state analysis entry must be a one-word emotion label.",
        behaviors = behaviors,
        drowsiness = drowsiness,
        emotion = analysis.emotional_state,
    )
}
