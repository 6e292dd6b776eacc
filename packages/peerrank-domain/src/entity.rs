/// The two populations linked by recommendation edges.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntityKind {
	Subject,
	Offer,
}
impl EntityKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Subject => "subject",
			Self::Offer => "offer",
		}
	}

	/// The population this kind is ranked against.
	pub fn opposite(self) -> Self {
		match self {
			Self::Subject => Self::Offer,
			Self::Offer => Self::Subject,
		}
	}

	/// Payload key carrying the entity id of a vector job.
	pub fn payload_key(self) -> &'static str {
		match self {
			Self::Subject => "subject_id",
			Self::Offer => "offer_id",
		}
	}

	pub fn text_label(self) -> &'static str {
		match self {
			Self::Subject => "Bio",
			Self::Offer => "Description",
		}
	}

	pub fn tag_label(self) -> &'static str {
		match self {
			Self::Subject => "Skills",
			Self::Offer => "Required Skills",
		}
	}
}
