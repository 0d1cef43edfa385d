use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Response type for mock user input
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum MockResponse {
    Text(String),
    Confirm(bool),
}

/// Trait for user input operations to enable testing with mocks
pub trait UserInput: Send + Sync {
    /// Display a text input prompt
    #[allow(dead_code)]
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Display a confirmation prompt (yes/no)
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Real user input implementation using inquire crate
pub struct InquireUserInput;

impl UserInput for InquireUserInput {
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        use inquire::Text;
        let mut text_prompt = Text::new(prompt);
        if let Some(default_val) = default {
            text_prompt = text_prompt.with_default(default_val);
        }
        let answer = text_prompt.prompt()?;
        Ok(answer)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        use inquire::Confirm;
        let answer = Confirm::new(prompt).with_default(default).prompt()?;
        Ok(answer)
    }
}

/// Mock user input implementation for testing
#[allow(dead_code)]
pub struct MockUserInput {
    responses: Mutex<VecDeque<MockResponse>>,
}

#[allow(dead_code)]
impl MockUserInput {
    /// Create new mock with no pre-configured responses
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a response to be returned by the next prompt
    pub fn push_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Create a mock that answers every confirmation prompt the same way
    pub fn confirming(answer: bool) -> Self {
        let mock = Self::new();
        mock.push_response(MockResponse::Confirm(answer));
        mock
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.responses.lock().unwrap().pop_front()
    }
}

impl Default for MockUserInput {
    fn default() -> Self {
        Self::new()
    }
}

impl UserInput for MockUserInput {
    fn text(&self, _prompt: &str, default: Option<&str>) -> Result<String> {
        match self.next_response() {
            Some(MockResponse::Text(answer)) => Ok(answer),
            Some(other) => Err(anyhow::anyhow!(
                "MockUserInput expected Text response, got {:?}",
                other
            )),
            None => Ok(default.unwrap_or_default().to_string()),
        }
    }

    fn confirm(&self, _prompt: &str, default: bool) -> Result<bool> {
        match self.next_response() {
            Some(MockResponse::Confirm(answer)) => Ok(answer),
            Some(other) => Err(anyhow::anyhow!(
                "MockUserInput expected Confirm response, got {:?}",
                other
            )),
            None => Ok(default),
        }
    }
}
