//! MBTI personality types used by the personality-aware policy variant

use serde::{Deserialize, Serialize};

use crate::action::Channel;

/// The sixteen MBTI types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonalityType {
    INTJ,
    INTP,
    ENTJ,
    ENTP,
    INFJ,
    INFP,
    ENFJ,
    ENFP,
    ISTJ,
    ISFJ,
    ESTJ,
    ESFJ,
    ISTP,
    ISFP,
    ESTP,
    ESFP,
}

impl PersonalityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityType::INTJ => "INTJ",
            PersonalityType::INTP => "INTP",
            PersonalityType::ENTJ => "ENTJ",
            PersonalityType::ENTP => "ENTP",
            PersonalityType::INFJ => "INFJ",
            PersonalityType::INFP => "INFP",
            PersonalityType::ENFJ => "ENFJ",
            PersonalityType::ENFP => "ENFP",
            PersonalityType::ISTJ => "ISTJ",
            PersonalityType::ISFJ => "ISFJ",
            PersonalityType::ESTJ => "ESTJ",
            PersonalityType::ESFJ => "ESFJ",
            PersonalityType::ISTP => "ISTP",
            PersonalityType::ISFP => "ISFP",
            PersonalityType::ESTP => "ESTP",
            PersonalityType::ESFP => "ESFP",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INTJ" => Some(PersonalityType::INTJ),
            "INTP" => Some(PersonalityType::INTP),
            "ENTJ" => Some(PersonalityType::ENTJ),
            "ENTP" => Some(PersonalityType::ENTP),
            "INFJ" => Some(PersonalityType::INFJ),
            "INFP" => Some(PersonalityType::INFP),
            "ENFJ" => Some(PersonalityType::ENFJ),
            "ENFP" => Some(PersonalityType::ENFP),
            "ISTJ" => Some(PersonalityType::ISTJ),
            "ISFJ" => Some(PersonalityType::ISFJ),
            "ESTJ" => Some(PersonalityType::ESTJ),
            "ESFJ" => Some(PersonalityType::ESFJ),
            "ISTP" => Some(PersonalityType::ISTP),
            "ISFP" => Some(PersonalityType::ISFP),
            "ESTP" => Some(PersonalityType::ESTP),
            "ESFP" => Some(PersonalityType::ESFP),
            _ => None,
        }
    }

    pub fn is_extraverted(&self) -> bool {
        self.as_str().starts_with('E')
    }

    pub fn is_thinking(&self) -> bool {
        self.as_str().as_bytes()[2] == b'T'
    }

    /// Communication guidance injected into personality-aware message
    /// generation prompts.
    pub fn communication_guidance(&self) -> &'static str {
        match self {
            PersonalityType::INTJ => {
                "Prefer direct, logical communication. Value efficiency and \
                 competence. Avoid emotional appeals."
            }
            PersonalityType::INTP => {
                "Appreciate detailed technical explanations. Prefer written \
                 communication. Value logical reasoning."
            }
            PersonalityType::ENTJ => {
                "Prefer direct, results-oriented communication. Value efficiency \
                 and clear action plans."
            }
            PersonalityType::ENTP => {
                "Enjoy exploring multiple options. Prefer engaging, dynamic \
                 communication. Value innovation."
            }
            PersonalityType::INFJ => {
                "Appreciate empathetic, personal communication. Value authenticity \
                 and meaningful connections."
            }
            PersonalityType::INFP => {
                "Prefer gentle, supportive communication. Value personal values \
                 and emotional authenticity."
            }
            PersonalityType::ENFJ => {
                "Appreciate warm, encouraging communication. Value harmony and \
                 helping others."
            }
            PersonalityType::ENFP => {
                "Prefer enthusiastic, creative communication. Value possibilities \
                 and personal growth."
            }
            PersonalityType::ISTJ => {
                "Prefer clear, structured communication. Value reliability and \
                 practical solutions."
            }
            PersonalityType::ISFJ => {
                "Appreciate patient, supportive communication. Value tradition \
                 and helping others."
            }
            PersonalityType::ESTJ => {
                "Prefer direct, organized communication. Value efficiency and \
                 clear procedures."
            }
            PersonalityType::ESFJ => {
                "Appreciate warm, cooperative communication. Value harmony and \
                 practical help."
            }
            PersonalityType::ISTP => {
                "Prefer practical, hands-on communication. Value flexibility and \
                 immediate solutions."
            }
            PersonalityType::ISFP => {
                "Appreciate gentle, artistic communication. Value personal space \
                 and authentic experiences."
            }
            PersonalityType::ESTP => {
                "Prefer dynamic, action-oriented communication. Value immediate \
                 results and flexibility."
            }
            PersonalityType::ESFP => {
                "Appreciate enthusiastic, social communication. Value fun and \
                 helping others."
            }
        }
    }

    /// Channel affinity adjustment in [0,1]. Extraverts weight synchronous
    /// phone contact higher; introverted thinking types prefer written email.
    pub fn channel_affinity(&self, channel: Channel) -> f64 {
        match channel {
            Channel::PhoneCall => {
                if self.is_extraverted() {
                    1.0
                } else {
                    0.3
                }
            }
            Channel::EmailReply => {
                if !self.is_extraverted() && self.is_thinking() {
                    1.0
                } else if !self.is_extraverted() {
                    0.8
                } else {
                    0.5
                }
            }
            Channel::SocialReply => {
                if self.is_extraverted() && !self.is_thinking() {
                    0.9
                } else {
                    0.5
                }
            }
        }
    }
}

impl std::fmt::Display for PersonalityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for raw in ["INTP", "esfp", " Enfj "] {
            let parsed = PersonalityType::parse(raw).expect("parses");
            assert_eq!(parsed.as_str(), raw.trim().to_ascii_uppercase());
        }
        assert!(PersonalityType::parse("XXXX").is_none());
    }

    #[test]
    fn extraverts_favor_phone() {
        assert!(
            PersonalityType::ESTP.channel_affinity(Channel::PhoneCall)
                > PersonalityType::INTP.channel_affinity(Channel::PhoneCall)
        );
    }

    #[test]
    fn introverted_thinkers_favor_email() {
        assert_eq!(PersonalityType::INTP.channel_affinity(Channel::EmailReply), 1.0);
        assert!(PersonalityType::ESFP.channel_affinity(Channel::EmailReply) < 1.0);
    }
}
