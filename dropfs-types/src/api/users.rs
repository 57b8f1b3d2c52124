use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SpaceUsage {
	pub used: u64,
	pub allocation: SpaceAllocation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum SpaceAllocation {
	Individual { allocated: u64 },
	Team { used: u64, allocated: u64 },
	#[serde(other)]
	Other,
}

impl SpaceAllocation {
	pub fn allocated(&self) -> u64 {
		match self {
			SpaceAllocation::Individual { allocated } => *allocated,
			SpaceAllocation::Team { allocated, .. } => *allocated,
			SpaceAllocation::Other => 0,
		}
	}
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
	pub account_id: String,
	pub email: String,
}
