//! Dockerfile templates for repositories that do not ship their own

use std::str::FromStr;

use crate::errors::AppError;

const NODE_DOCKERFILE: &str = r#"
FROM node:20-alpine
WORKDIR /app
COPY package*.json ./
RUN npm install --production
COPY . .
EXPOSE 3000
CMD ["npm","start"]
"#;

const REACT_DOCKERFILE: &str = r#"
FROM node:20-alpine as build
WORKDIR /app
COPY . .
RUN npm install && npm run build

FROM nginx:alpine
COPY --from=build /app/build /usr/share/nginx/html
EXPOSE 80
CMD ["nginx","-g","daemon off;"]
"#;

const GO_DOCKERFILE: &str = r#"
FROM golang:1.22-alpine as build
WORKDIR /app
COPY go.mod go.sum ./
RUN go mod download
COPY . .
RUN CGO_ENABLED=0 GOOS=linux go build -o app

FROM alpine
WORKDIR /app
COPY --from=build /app/app .
EXPOSE 8080
CMD ["./app"]
"#;

const FLUTTER_DOCKERFILE: &str = r#"
FROM ghcr.io/cirruslabs/flutter:stable as build
WORKDIR /app
COPY . .
RUN flutter build web

FROM nginx:alpine
COPY --from=build /app/build/web /usr/share/nginx/html
EXPOSE 80
CMD ["nginx","-g","daemon off;"]
"#;

/// Frameworks a Dockerfile can be generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    /// Node.js server started with `npm start`
    Node,
    /// Static single-page app served by nginx
    React,
    /// Statically linked Go binary
    Go,
    /// Flutter web build served by nginx
    Flutter,
}

impl Framework {
    pub fn dockerfile(&self) -> &'static str {
        match self {
            Framework::Node => NODE_DOCKERFILE,
            Framework::React => REACT_DOCKERFILE,
            Framework::Go => GO_DOCKERFILE,
            Framework::Flutter => FLUTTER_DOCKERFILE,
        }
    }
}

impl FromStr for Framework {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(Framework::Node),
            "react" => Ok(Framework::React),
            "go" => Ok(Framework::Go),
            "flutter" => Ok(Framework::Flutter),
            other => Err(AppError::UnsupportedFramework(other.to_string())),
        }
    }
}

/// Build recipe text for a framework identifier
pub fn dockerfile_for(framework: &str) -> Result<&'static str, AppError> {
    framework.parse::<Framework>().map(|f| f.dockerfile())
}
